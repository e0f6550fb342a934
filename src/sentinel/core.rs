use std::fmt;

use serde::{Deserialize, Serialize};

use crate::host::TaggedNode;
use crate::registry::OwnerId;

/// Attribute carrying the sentinel's edge (`top` or `bottom`).
pub const LOCATION_ATTR: &str = "data-sticky-sentinel-location";
/// Attribute carrying the owner id of the tracked element.
pub const OWNER_ATTR: &str = "data-sticky-sentinel-for";

/// CSS-style length used for sentinel sizes and offsets.
///
/// Numbers deserialize as pixels; strings are kept verbatim (`"-24px"`,
/// `"50%"`, `"3rem"`) and handed to the rendering layer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Length {
    Px(f64),
    Css(String),
}

impl Length {
    pub fn px(value: f64) -> Self {
        Length::Px(value)
    }

    pub fn percent(value: f64) -> Self {
        Length::Css(format!("{value}%"))
    }

    /// Resolve to pixels. Percentages are taken of `basis`; unit-less
    /// numbers are pixels; other units are not resolvable.
    pub fn resolve(&self, basis: f64) -> Option<f64> {
        match self {
            Length::Px(value) => Some(*value),
            Length::Css(raw) => {
                let raw = raw.trim();
                if let Some(number) = raw.strip_suffix("px") {
                    number.trim().parse().ok()
                } else if let Some(number) = raw.strip_suffix('%') {
                    number.trim().parse::<f64>().ok().map(|pct| basis * pct / 100.0)
                } else {
                    raw.parse().ok()
                }
            }
        }
    }
}

impl Default for Length {
    fn default() -> Self {
        Length::Px(0.0)
    }
}

impl From<f64> for Length {
    fn from(value: f64) -> Self {
        Length::Px(value)
    }
}

impl From<&str> for Length {
    fn from(value: &str) -> Self {
        Length::Css(value.to_string())
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Px(value) if *value == 0.0 => f.write_str("0"),
            Length::Px(value) => write!(f, "{value}px"),
            Length::Css(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSentinelGeometry {
    pub height: Length,
    /// Distance from the top of the containing block; usually negative so
    /// the sentinel leaves the root slightly before the element pins.
    #[serde(alias = "top")]
    pub offset: Length,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottomSentinelGeometry {
    pub height: Length,
}

/// Size and placement of the two boundary markers around a tracked element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelGeometry {
    pub top: TopSentinelGeometry,
    pub bottom: BottomSentinelGeometry,
}

impl SentinelGeometry {
    pub fn new(top_height: impl Into<Length>, top_offset: impl Into<Length>, bottom_height: impl Into<Length>) -> Self {
        Self {
            top: TopSentinelGeometry {
                height: top_height.into(),
                offset: top_offset.into(),
            },
            bottom: BottomSentinelGeometry {
                height: bottom_height.into(),
            },
        }
    }
}

impl Default for SentinelGeometry {
    fn default() -> Self {
        Self::new(1.0, 0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentinelLocation {
    Top,
    Bottom,
}

impl SentinelLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            SentinelLocation::Top => "top",
            SentinelLocation::Bottom => "bottom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "top" => Some(SentinelLocation::Top),
            "bottom" => Some(SentinelLocation::Bottom),
            _ => None,
        }
    }
}

impl fmt::Display for SentinelLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag carried by an invisible boundary marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sentinel {
    pub location: SentinelLocation,
    pub owner: OwnerId,
}

impl Sentinel {
    pub fn new(location: SentinelLocation, owner: OwnerId) -> Self {
        Self { location, owner }
    }

    pub fn top(owner: OwnerId) -> Self {
        Self::new(SentinelLocation::Top, owner)
    }

    pub fn bottom(owner: OwnerId) -> Self {
        Self::new(SentinelLocation::Bottom, owner)
    }

    pub fn attributes(&self) -> [(&'static str, String); 2] {
        [
            (LOCATION_ATTR, self.location.as_str().to_string()),
            (OWNER_ATTR, self.owner.as_str().to_string()),
        ]
    }

    /// Read the tag back from a host node. Nodes without both attributes
    /// are not sentinels.
    pub fn from_node<N: TaggedNode + ?Sized>(node: &N) -> Option<Self> {
        let location = SentinelLocation::parse(&node.attribute(LOCATION_ATTR)?)?;
        let owner = node.attribute(OWNER_ATTR)?;
        if owner.is_empty() {
            return None;
        }
        Some(Self::new(location, OwnerId::from(owner)))
    }
}

/// The two host nodes bracketing one tracked element.
#[derive(Debug, Clone, PartialEq)]
pub struct SentinelPair<N> {
    pub top: N,
    pub bottom: N,
}

/// Style declarations the rendering layer applies to a sentinel node.
#[derive(Debug, Clone, PartialEq)]
pub struct SentinelStyle {
    declarations: Vec<(&'static str, String)>,
}

impl SentinelStyle {
    pub fn for_sentinel(location: SentinelLocation, geometry: &SentinelGeometry) -> Self {
        let mut declarations = vec![
            ("left", "0".to_string()),
            ("position", "absolute".to_string()),
            ("right", "0".to_string()),
            ("visibility", "hidden".to_string()),
        ];
        match location {
            SentinelLocation::Top => {
                declarations.push(("height", geometry.top.height.to_string()));
                declarations.push(("top", geometry.top.offset.to_string()));
            }
            SentinelLocation::Bottom => {
                declarations.push(("height", geometry.bottom.height.to_string()));
                declarations.push(("bottom", "0".to_string()));
            }
        }
        Self { declarations }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|(name, _)| *name == property)
            .map(|(_, value)| value.as_str())
    }

    pub fn declarations(&self) -> &[(&'static str, String)] {
        &self.declarations
    }

    /// Inline `style` attribute text.
    pub fn to_css(&self) -> String {
        self.declarations
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
