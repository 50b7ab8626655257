//! Input policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SurfaceError;

/// How a button press changes the button's state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputPolicy {
    /// Key-down flips the state, key-up is ignored
    #[default]
    Toggle,
    /// State follows the incoming value (momentary)
    Trigger,
    /// Key-down starts or stops a periodic toggle
    Blink,
}

impl InputPolicy {
    pub const ALL: [InputPolicy; 3] = [InputPolicy::Toggle, InputPolicy::Trigger, InputPolicy::Blink];

    pub fn name(self) -> &'static str {
        match self {
            InputPolicy::Toggle => "toggle",
            InputPolicy::Trigger => "trigger",
            InputPolicy::Blink => "blink",
        }
    }
}

impl FromStr for InputPolicy {
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputPolicy::ALL
            .into_iter()
            .find(|policy| policy.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SurfaceError::UnknownPolicy(s.to_string()))
    }
}

impl fmt::Display for InputPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("toggle".parse::<InputPolicy>().unwrap(), InputPolicy::Toggle);
        assert_eq!("Trigger".parse::<InputPolicy>().unwrap(), InputPolicy::Trigger);
        assert_eq!(" blink ".parse::<InputPolicy>().unwrap(), InputPolicy::Blink);
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            "strobe".parse::<InputPolicy>(),
            Err(SurfaceError::UnknownPolicy("strobe".to_string()))
        );
    }

    #[test]
    fn test_display_round_trips() {
        for policy in InputPolicy::ALL {
            assert_eq!(policy.to_string().parse::<InputPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_yaml_names() {
        let policy: InputPolicy = serde_yaml::from_str("blink").unwrap();
        assert_eq!(policy, InputPolicy::Blink);
    }
}
