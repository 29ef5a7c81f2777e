use std::fmt;
use std::str::FromStr;

use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// POSIX signals as listed in RFC 4254 Section 6.10.
pub const SIGNALS: [(&str, Signal); 13] = [
    ("ABRT", Signal::SIGABRT),
    ("ALRM", Signal::SIGALRM),
    ("FPE", Signal::SIGFPE),
    ("HUP", Signal::SIGHUP),
    ("ILL", Signal::SIGILL),
    ("INT", Signal::SIGINT),
    ("KILL", Signal::SIGKILL),
    ("PIPE", Signal::SIGPIPE),
    ("QUIT", Signal::SIGQUIT),
    ("SEGV", Signal::SIGSEGV),
    ("TERM", Signal::SIGTERM),
    ("USR1", Signal::SIGUSR1),
    ("USR2", Signal::SIGUSR2),
];

/// Signal sent to surviving processes when the pool terminates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KillSignal(Signal);

impl KillSignal {
    pub fn new(signal: Signal) -> Self {
        Self(signal)
    }

    pub fn signal(&self) -> Signal {
        self.0
    }

    pub fn number(&self) -> i32 {
        self.0 as i32
    }

    /// Short name without the `SIG` prefix, e.g. `TERM`.
    pub fn name(&self) -> &'static str {
        SIGNALS
            .iter()
            .find(|(_, s)| *s == self.0)
            .map(|(name, _)| *name)
            .unwrap_or_else(|| self.0.as_str())
    }

    /// Parse a signal name (`TERM`, `SIGTERM`, case-insensitive) or number.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let trimmed = s.trim();

        if let Ok(num) = trimmed.parse::<i32>() {
            return SIGNALS
                .iter()
                .find(|(_, signal)| *signal as i32 == num)
                .map(|(_, signal)| Self(*signal))
                .ok_or_else(|| CoreError::UnknownSignal(s.to_string()));
        }

        let upper = trimmed.to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);

        SIGNALS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, signal)| Self(*signal))
            .ok_or_else(|| CoreError::UnknownSignal(s.to_string()))
    }
}

impl Default for KillSignal {
    fn default() -> Self {
        Self(Signal::SIGKILL)
    }
}

impl fmt::Display for KillSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KillSignal {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for KillSignal {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<KillSignal> for String {
    fn from(value: KillSignal) -> Self {
        value.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!(KillSignal::parse("TERM").unwrap().signal(), Signal::SIGTERM);
        assert_eq!(KillSignal::parse("SIGINT").unwrap().signal(), Signal::SIGINT);
        assert_eq!(KillSignal::parse("usr1").unwrap().signal(), Signal::SIGUSR1);
        assert_eq!(KillSignal::parse("sighup").unwrap().signal(), Signal::SIGHUP);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(KillSignal::parse("9").unwrap().signal(), Signal::SIGKILL);
        assert_eq!(KillSignal::parse("15").unwrap().signal(), Signal::SIGTERM);
    }

    #[test]
    fn test_every_entry_maps_to_itself() {
        for (name, signal) in SIGNALS {
            let parsed = KillSignal::parse(name).unwrap();
            assert_eq!(parsed.signal(), signal);
            assert_eq!(parsed.name(), name);
        }
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            KillSignal::parse("BOGUS").unwrap_err(),
            CoreError::UnknownSignal("BOGUS".to_string())
        );
        assert!(KillSignal::parse("0").is_err());
        // STOP is a real signal but not part of the table
        assert!(KillSignal::parse("STOP").is_err());
    }

    #[test]
    fn test_default_is_kill() {
        assert_eq!(KillSignal::default().signal(), Signal::SIGKILL);
        assert_eq!(KillSignal::default().to_string(), "KILL");
    }

    #[test]
    fn test_serde_as_name() {
        let json = serde_json::to_string(&KillSignal::new(Signal::SIGTERM)).unwrap();
        assert_eq!(json, "\"TERM\"");

        let parsed: KillSignal = serde_json::from_str("\"SIGQUIT\"").unwrap();
        assert_eq!(parsed.signal(), Signal::SIGQUIT);

        assert!(serde_json::from_str::<KillSignal>("\"NOPE\"").is_err());
    }
}
