use serde::{Deserialize, Serialize};

/// Display metadata attached to a downstream message.
///
/// Every field is optional on the wire; an empty string or list means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    /// Drawable resource name on Android, asset name on iOS.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon: String,
    /// `default` or the file name of a bundled sound resource.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sound: String,
    /// Home screen badge. iOS only.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub badge: String,
    /// Notifications sharing a tag replace each other in the drawer.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// Icon color in `#rrggbb` form. Android only.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub click_action: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body_loc_key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub body_loc_args: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title_loc_key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub title_loc_args: Vec<String>,
}

impl Notification {
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { title: title.into(), body: body.into(), ..Self::default() }
    }

    /// Returns true when the notification carries nothing to display.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
