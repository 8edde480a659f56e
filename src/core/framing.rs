// Framing kinds understood by the frame factory.
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// How a byte stream is split into frames.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum FramingType {
    /// Documents separated by a `---` line.
    Yaml,
    /// Self-delimiting JSON objects or arrays placed back to back.
    Json,
    /// The whole stream is one frame.
    Single,
    /// Anything else; only readable or writable when `max_frames == 1`.
    Unrecognized(String),
}

impl FramingType {
    pub fn as_str(&self) -> &str {
        match self {
            FramingType::Yaml => "yaml",
            FramingType::Json => "json",
            FramingType::Single => "single",
            FramingType::Unrecognized(name) => name.as_str(),
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/yaml" | "application/x-yaml" | "text/yaml" | "text/x-yaml" => {
                Some(FramingType::Yaml)
            }
            "application/json" => Some(FramingType::Json),
            _ => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, FramingType::Unrecognized(_))
    }

    /// True when `frame` would vanish on the read side: separator framings skip
    /// whitespace between frames, so a whitespace-only frame never reads back.
    pub fn is_blank_frame(&self, frame: &[u8]) -> bool {
        match self {
            FramingType::Yaml | FramingType::Json => frame.trim_ascii().is_empty(),
            FramingType::Single | FramingType::Unrecognized(_) => frame.is_empty(),
        }
    }
}

impl FromStr for FramingType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => FramingType::Yaml,
            "json" => FramingType::Json,
            "single" => FramingType::Single,
            _ => FramingType::Unrecognized(s.to_string()),
        })
    }
}

impl From<&str> for FramingType {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(framing_type) => framing_type,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for FramingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
