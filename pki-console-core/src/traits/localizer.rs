//! 本地化抽象 Trait

/// Localization collaborator.
///
/// The core never looks strings up itself; it only forwards the locale the
/// backend selected with a structure response.
pub trait Localizer: Send + Sync {
    /// Switches the active locale. Fire-and-forget.
    fn set_locale(&self, language_tag: &str);
}
