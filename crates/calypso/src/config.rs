//! Security settings of a transaction
//!
//! [`SecuritySettings`] is built through [`SecuritySettingsBuilder`], which
//! validates the values once. With the `serde` feature both types can be
//! loaded from a terminal configuration file; deserializing settings goes
//! through the same validation.

use crate::commands::WorkKey;
use crate::constants::KIF_UNDEFINED;
use crate::error::{Error, Result};
use crate::session::AccessLevel;

/// Default KIF of the personalization key
pub const DEFAULT_KIF_PERSONALIZATION: u8 = 0x21;
/// Default KIF of the load key
pub const DEFAULT_KIF_LOAD: u8 = 0x27;
/// Default KIF of the debit key
pub const DEFAULT_KIF_DEBIT: u8 = 0x30;

/// How the card is asked to ratify the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum RatificationMode {
    /// The session is ratified by Close Secure Session itself
    #[default]
    CloseRatified,
    /// The session is ratified by the next command; in contactless mode a
    /// ratification command is sent right after closing
    CloseNotRatified,
}

/// When digest commands are sent to the SAM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum DigestMode {
    /// Every digest command is sent as soon as it is known, so a SAM
    /// rejecting the work key stops the session at opening
    #[default]
    Immediate,
    /// Digest Init, Updates and Close are sent as one batch when closing
    Deferred,
}

/// One value per access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerAccessLevel<T> {
    /// Value for the personalization level
    pub personalization: T,
    /// Value for the load level
    pub load: T,
    /// Value for the debit level
    pub debit: T,
}

impl<T: Copy> PerAccessLevel<T> {
    /// Value for a level
    pub const fn get(&self, level: AccessLevel) -> T {
        match level {
            AccessLevel::Personalization => self.personalization,
            AccessLevel::Load => self.load,
            AccessLevel::Debit => self.debit,
        }
    }

    fn set(&mut self, level: AccessLevel, value: T) {
        match level {
            AccessLevel::Personalization => self.personalization = value,
            AccessLevel::Load => self.load = value,
            AccessLevel::Debit => self.debit = value,
        }
    }

    fn values(&self) -> [(AccessLevel, T); 3] {
        [
            (AccessLevel::Personalization, self.personalization),
            (AccessLevel::Load, self.load),
            (AccessLevel::Debit, self.debit),
        ]
    }
}

/// Validated security settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "SecuritySettingsBuilder", into = "SecuritySettingsBuilder")
)]
pub struct SecuritySettings {
    default_kif: PerAccessLevel<Option<u8>>,
    default_kvc: PerAccessLevel<Option<u8>>,
    key_record_number: PerAccessLevel<u8>,
    ratification_mode: RatificationMode,
    digest_mode: DigestMode,
    extended_mode: bool,
}

impl SecuritySettings {
    /// Start from the default settings
    pub fn builder() -> SecuritySettingsBuilder {
        SecuritySettingsBuilder::default()
    }

    /// KIF used when the card does not provide one
    pub const fn default_kif(&self, level: AccessLevel) -> Option<u8> {
        self.default_kif.get(level)
    }

    /// KVC used when the card does not provide one
    pub const fn default_kvc(&self, level: AccessLevel) -> Option<u8> {
        self.default_kvc.get(level)
    }

    /// SAM record of the work key, used when no KIF/KVC pair is known
    pub const fn key_record_number(&self, level: AccessLevel) -> u8 {
        self.key_record_number.get(level)
    }

    /// Ratification mode
    pub const fn ratification_mode(&self) -> RatificationMode {
        self.ratification_mode
    }

    /// Digest dispatch mode
    pub const fn digest_mode(&self) -> DigestMode {
        self.digest_mode
    }

    /// Whether revision 3.2 cards are opened in extended mode
    pub const fn extended_mode(&self) -> bool {
        self.extended_mode
    }

    /// Resolve the SAM work key from what the card sent at opening
    ///
    /// A KIF of `0xFF` is replaced by the default KIF of the access level and
    /// a missing KVC by the default KVC. Without both, the key is designated
    /// by its record number.
    pub fn work_key(&self, level: AccessLevel, kif: u8, kvc: Option<u8>) -> WorkKey {
        let kif = if kif == KIF_UNDEFINED {
            self.default_kif(level)
        } else {
            Some(kif)
        };
        match (kif, kvc.or(self.default_kvc(level))) {
            (Some(kif), Some(kvc)) => WorkKey::Kif { kif, kvc },
            _ => WorkKey::Record(self.key_record_number(level)),
        }
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        SecuritySettingsBuilder::default().into_settings()
    }
}

/// Builder for [`SecuritySettings`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SecuritySettingsBuilder {
    /// KIF used when the card does not provide one
    pub default_kif: PerAccessLevel<Option<u8>>,
    /// KVC used when the card does not provide one
    pub default_kvc: PerAccessLevel<Option<u8>>,
    /// SAM record of the work key, per level
    pub key_record_number: PerAccessLevel<u8>,
    /// Ratification mode
    pub ratification_mode: RatificationMode,
    /// Digest dispatch mode
    pub digest_mode: DigestMode,
    /// Whether revision 3.2 cards are opened in extended mode
    pub extended_mode: bool,
}

impl Default for SecuritySettingsBuilder {
    fn default() -> Self {
        Self {
            default_kif: PerAccessLevel {
                personalization: Some(DEFAULT_KIF_PERSONALIZATION),
                load: Some(DEFAULT_KIF_LOAD),
                debit: Some(DEFAULT_KIF_DEBIT),
            },
            default_kvc: PerAccessLevel::default(),
            key_record_number: PerAccessLevel {
                personalization: 0x01,
                load: 0x02,
                debit: 0x03,
            },
            ratification_mode: RatificationMode::default(),
            digest_mode: DigestMode::default(),
            extended_mode: true,
        }
    }
}

impl SecuritySettingsBuilder {
    /// Set the default KIF of a level
    pub fn default_kif(mut self, level: AccessLevel, kif: u8) -> Self {
        self.default_kif.set(level, Some(kif));
        self
    }

    /// Set the default KVC of a level
    pub fn default_kvc(mut self, level: AccessLevel, kvc: u8) -> Self {
        self.default_kvc.set(level, Some(kvc));
        self
    }

    /// Set the SAM work key record number of a level
    pub fn key_record_number(mut self, level: AccessLevel, record: u8) -> Self {
        self.key_record_number.set(level, record);
        self
    }

    /// Set the ratification mode
    pub const fn ratification_mode(mut self, mode: RatificationMode) -> Self {
        self.ratification_mode = mode;
        self
    }

    /// Set the digest dispatch mode
    pub const fn digest_mode(mut self, mode: DigestMode) -> Self {
        self.digest_mode = mode;
        self
    }

    /// Enable or disable the extended mode for revision 3.2 cards
    pub const fn extended_mode(mut self, enabled: bool) -> Self {
        self.extended_mode = enabled;
        self
    }

    /// Validate and build the settings
    pub fn build(self) -> Result<SecuritySettings> {
        for (level, kif) in self.default_kif.values() {
            if kif == Some(KIF_UNDEFINED) {
                return Err(Error::config(format!(
                    "default KIF for the {level} level cannot be {KIF_UNDEFINED:#04X}"
                )));
            }
        }
        for (level, record) in self.key_record_number.values() {
            if record == 0 {
                return Err(Error::config(format!(
                    "key record number for the {level} level cannot be 0"
                )));
            }
        }
        Ok(self.into_settings())
    }

    fn into_settings(self) -> SecuritySettings {
        SecuritySettings {
            default_kif: self.default_kif,
            default_kvc: self.default_kvc,
            key_record_number: self.key_record_number,
            ratification_mode: self.ratification_mode,
            digest_mode: self.digest_mode,
            extended_mode: self.extended_mode,
        }
    }
}

impl TryFrom<SecuritySettingsBuilder> for SecuritySettings {
    type Error = Error;

    fn try_from(builder: SecuritySettingsBuilder) -> Result<Self> {
        builder.build()
    }
}

impl From<SecuritySettings> for SecuritySettingsBuilder {
    fn from(settings: SecuritySettings) -> Self {
        Self {
            default_kif: settings.default_kif,
            default_kvc: settings.default_kvc,
            key_record_number: settings.key_record_number,
            ratification_mode: settings.ratification_mode,
            digest_mode: settings.digest_mode,
            extended_mode: settings.extended_mode,
        }
    }
}
