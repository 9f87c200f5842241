use std::fmt;

// ---------------------------------------------------------------------------
// String-based identity newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype!(ImageId);
string_newtype!(RegionId);

// ---------------------------------------------------------------------------
// ImageDimensions — pixel size of a decoded image
// ---------------------------------------------------------------------------

/// Pixel dimensions of an image, obtained by decoding the actual bytes.
/// Always supplied from outside; nothing in the core reads image files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
