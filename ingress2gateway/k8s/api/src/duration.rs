use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, time::Duration};

/// A Gateway API duration (GEP-2257).
///
/// Durations are a sequence of `<integer><unit>` components where unit is one
/// of `h`, `m`, `s` or `ms`. Sub-millisecond precision is not representable and
/// is truncated on conversion.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GatewayDuration(Duration);

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("empty duration")]
    Empty,

    #[error("invalid number: {}", .0)]
    NotANumber(#[from] std::num::ParseIntError),
}

const EXPECTED_UNITS: &str = "expected one of 'ms', 's', 'm', or 'h'";

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

impl From<Duration> for GatewayDuration {
    fn from(duration: Duration) -> Self {
        Self(Duration::new(
            duration.as_secs(),
            duration.subsec_millis() * 1_000_000,
        ))
    }
}

impl From<GatewayDuration> for Duration {
    fn from(GatewayDuration(duration): GatewayDuration) -> Self {
        duration
    }
}

impl GatewayDuration {
    #[inline]
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    #[inline]
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl fmt::Debug for GatewayDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for GatewayDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();
        if millis == 0 {
            return f.write_str("0s");
        }

        let hours = millis / HOUR.as_millis();
        let minutes = (millis % HOUR.as_millis()) / MINUTE.as_millis();
        let secs = (millis % MINUTE.as_millis()) / 1000;
        let millis = millis % 1000;
        for (val, unit) in [(hours, "h"), (minutes, "m"), (secs, "s"), (millis, "ms")] {
            if val > 0 {
                write!(f, "{val}{unit}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for GatewayDuration {
    type Err = ParseError;

    fn from_str(mut s: &str) -> Result<Self, Self::Err> {
        fn duration_from_units(val: u32, unit: &str) -> Result<Duration, ParseError> {
            let base = match unit {
                "ms" => Duration::from_millis(1),
                "s" => Duration::from_secs(1),
                "m" => MINUTE,
                "h" => HOUR,
                _ => return Err(ParseError::InvalidUnit),
            };
            Ok(base * val)
        }

        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut total = Duration::from_secs(0);
        while !s.is_empty() {
            let Some(unit_start) = s.find(|c: char| !c.is_ascii_digit()) else {
                return Err(ParseError::NoUnit);
            };
            let (val, rest) = s.split_at(unit_start);
            let val = val.parse::<u32>()?;
            let unit = match rest.find(|c: char| c.is_ascii_digit()) {
                Some(next_numeric_start) => {
                    let (unit, rest) = rest.split_at(next_numeric_start);
                    s = rest;
                    unit
                }
                None => {
                    s = "";
                    rest
                }
            };
            total += duration_from_units(val, unit)?;
        }

        Ok(Self(total))
    }
}

impl Serialize for GatewayDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GatewayDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = GatewayDuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string in Gateway API duration format")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse::<GatewayDuration>().map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

impl schemars::JsonSchema for GatewayDuration {
    fn schema_name() -> String {
        "GatewayDuration".to_owned()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            string: Some(Box::new(schemars::schema::StringValidation {
                pattern: Some(r"^([0-9]{1,5}(h|m|s|ms)){1,4}$".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}
