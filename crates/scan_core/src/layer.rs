//! Named classifier layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A named stage of the classifier backbone whose output can be explained.
///
/// Names follow the torchvision ResNet layout. The dotted form used by the
/// original checkpoints (`backbone.layer4`) is accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerId {
    /// Stem: 7x7 convolution, batch norm, ReLU and max pooling.
    Stem,
    /// First residual stage.
    Layer1,
    /// Second residual stage.
    Layer2,
    /// Third residual stage.
    Layer3,
    /// Last residual stage before global pooling.
    Layer4,
}

impl LayerId {
    /// All layers in forward order.
    pub const ALL: [LayerId; 5] = [
        LayerId::Stem,
        LayerId::Layer1,
        LayerId::Layer2,
        LayerId::Layer3,
        LayerId::Layer4,
    ];

    /// Layer explained when no other is requested.
    pub const DEFAULT_TARGET: LayerId = LayerId::Layer4;

    /// Short name of the layer.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            LayerId::Stem => "stem",
            LayerId::Layer1 => "layer1",
            LayerId::Layer2 => "layer2",
            LayerId::Layer3 => "layer3",
            LayerId::Layer4 => "layer4",
        }
    }

    /// Position of the layer in forward order.
    #[must_use]
    pub const fn depth(&self) -> usize {
        match self {
            LayerId::Stem => 0,
            LayerId::Layer1 => 1,
            LayerId::Layer2 => 2,
            LayerId::Layer3 => 3,
            LayerId::Layer4 => 4,
        }
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::DEFAULT_TARGET
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayerId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix("backbone.").unwrap_or(name);
        LayerId::ALL
            .into_iter()
            .find(|layer| layer.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| CoreError::UnknownLayer(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_dotted() {
        assert_eq!("layer4".parse::<LayerId>().unwrap(), LayerId::Layer4);
        assert_eq!("backbone.layer3".parse::<LayerId>().unwrap(), LayerId::Layer3);
        assert_eq!("Stem".parse::<LayerId>().unwrap(), LayerId::Stem);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "backbone.fc".parse::<LayerId>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownLayer(name) if name == "backbone.fc"));
    }

    #[test]
    fn test_default_is_last_stage() {
        assert_eq!(LayerId::default(), LayerId::Layer4);
        assert_eq!(LayerId::ALL.last(), Some(&LayerId::Layer4));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&LayerId::Layer2).unwrap();
        assert_eq!(json, "\"layer2\"");
        let decoded: LayerId = serde_json::from_str("\"layer4\"").unwrap();
        assert_eq!(decoded, LayerId::Layer4);
    }
}
