use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome tier of a branch audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Excellent,
    Good,
    Regular,
    Critical,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditStatus::Excellent => write!(f, "excellent"),
            AuditStatus::Good => write!(f, "good"),
            AuditStatus::Regular => write!(f, "regular"),
            AuditStatus::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for AuditStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excellent" => Ok(AuditStatus::Excellent),
            "good" => Ok(AuditStatus::Good),
            "regular" => Ok(AuditStatus::Regular),
            "critical" => Ok(AuditStatus::Critical),
            _ => Err(()),
        }
    }
}

impl Default for AuditStatus {
    fn default() -> Self {
        AuditStatus::Regular
    }
}

/// Presentation tier for an audit score. Derived on every render, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTier {
    Emerald,
    Neutral,
    Amber,
    Red,
}

impl fmt::Display for ScoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreTier::Emerald => write!(f, "emerald"),
            ScoreTier::Neutral => write!(f, "neutral"),
            ScoreTier::Amber => write!(f, "amber"),
            ScoreTier::Red => write!(f, "red"),
        }
    }
}

pub fn score_tier(score: i64) -> ScoreTier {
    if score >= 90 {
        ScoreTier::Emerald
    } else if score >= 70 {
        ScoreTier::Neutral
    } else if score >= 50 {
        ScoreTier::Amber
    } else {
        ScoreTier::Red
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(default)]
    pub id: String,
    /// References LocationRecord.id; the only cross-collection join.
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub auditor: String,
    #[serde(default)]
    pub admin_name: String,
    /// ISO `YYYY-MM-DD`; the form defaults it to the current date.
    #[serde(default)]
    pub audit_date: String,
    #[serde(default)]
    pub status: AuditStatus,
    /// 0 to 100 inclusive.
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub observations: String,
}

/// Kind of external system an access credential unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Web,
    Api,
    Ftp,
    Ssh,
    Database,
    Other,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Web => write!(f, "web"),
            AccessKind::Api => write!(f, "api"),
            AccessKind::Ftp => write!(f, "ftp"),
            AccessKind::Ssh => write!(f, "ssh"),
            AccessKind::Database => write!(f, "database"),
            AccessKind::Other => write!(f, "other"),
        }
    }
}

impl FromStr for AccessKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(AccessKind::Web),
            "api" => Ok(AccessKind::Api),
            "ftp" => Ok(AccessKind::Ftp),
            "ssh" => Ok(AccessKind::Ssh),
            "database" => Ok(AccessKind::Database),
            "other" => Ok(AccessKind::Other),
            _ => Err(()),
        }
    }
}

impl Default for AccessKind {
    fn default() -> Self {
        AccessKind::Web
    }
}

/// Stored login details for a third-party portal (MTC access).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessRecord {
    #[serde(default)]
    pub id: String,
    /// Unique among all access records, case-insensitive.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub kind: AccessKind,
    #[serde(default)]
    pub notes: String,
    /// Epoch milliseconds as text, set by the client at write time.
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl AccessRecord {
    pub fn has_full_credentials(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.username) && filled(&self.password)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartCategory {
    Electrico,
    Mecanico,
    Hidraulico,
    Electronico,
    Consumible,
    Herramienta,
    Otros,
}

impl fmt::Display for PartCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartCategory::Electrico => write!(f, "electrico"),
            PartCategory::Mecanico => write!(f, "mecanico"),
            PartCategory::Hidraulico => write!(f, "hidraulico"),
            PartCategory::Electronico => write!(f, "electronico"),
            PartCategory::Consumible => write!(f, "consumible"),
            PartCategory::Herramienta => write!(f, "herramienta"),
            PartCategory::Otros => write!(f, "otros"),
        }
    }
}

impl FromStr for PartCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "electrico" => Ok(PartCategory::Electrico),
            "mecanico" => Ok(PartCategory::Mecanico),
            "hidraulico" => Ok(PartCategory::Hidraulico),
            "electronico" => Ok(PartCategory::Electronico),
            "consumible" => Ok(PartCategory::Consumible),
            "herramienta" => Ok(PartCategory::Herramienta),
            "otros" => Ok(PartCategory::Otros),
            _ => Err(()),
        }
    }
}

impl Default for PartCategory {
    fn default() -> Self {
        PartCategory::Otros
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartUnit {
    Pieza,
    Caja,
    Metro,
    Litro,
    Kilogramo,
    Juego,
}

impl fmt::Display for PartUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartUnit::Pieza => write!(f, "pieza"),
            PartUnit::Caja => write!(f, "caja"),
            PartUnit::Metro => write!(f, "metro"),
            PartUnit::Litro => write!(f, "litro"),
            PartUnit::Kilogramo => write!(f, "kilogramo"),
            PartUnit::Juego => write!(f, "juego"),
        }
    }
}

impl FromStr for PartUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pieza" => Ok(PartUnit::Pieza),
            "caja" => Ok(PartUnit::Caja),
            "metro" => Ok(PartUnit::Metro),
            "litro" => Ok(PartUnit::Litro),
            "kilogramo" => Ok(PartUnit::Kilogramo),
            "juego" => Ok(PartUnit::Juego),
            _ => Err(()),
        }
    }
}

impl Default for PartUnit {
    fn default() -> Self {
        PartUnit::Pieza
    }
}

/// Spare-part inventory row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparePartRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub category: PartCategory,
    #[serde(default)]
    pub unit: PartUnit,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub min_quantity: i64,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl SparePartRecord {
    /// Low stock is derived, never stored.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

/// Target of the audit location join.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_tiers_follow_thresholds() {
        assert_eq!(score_tier(95), ScoreTier::Emerald);
        assert_eq!(score_tier(90), ScoreTier::Emerald);
        assert_eq!(score_tier(72), ScoreTier::Neutral);
        assert_eq!(score_tier(70), ScoreTier::Neutral);
        assert_eq!(score_tier(55), ScoreTier::Amber);
        assert_eq!(score_tier(50), ScoreTier::Amber);
        assert_eq!(score_tier(49), ScoreTier::Red);
        assert_eq!(score_tier(10), ScoreTier::Red);
        assert_eq!(score_tier(0), ScoreTier::Red);
    }

    #[test]
    fn audit_status_round_trips_through_text() {
        for status in [
            AuditStatus::Excellent,
            AuditStatus::Good,
            AuditStatus::Regular,
            AuditStatus::Critical,
        ] {
            assert_eq!(status.to_string().parse::<AuditStatus>(), Ok(status));
        }
        assert!("bogus".parse::<AuditStatus>().is_err());
    }

    #[test]
    fn full_credentials_require_both_fields_nonblank() {
        let mut record = AccessRecord {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..AccessRecord::default()
        };
        assert!(record.has_full_credentials());

        record.password = Some("   ".to_string());
        assert!(!record.has_full_credentials());

        record.password = None;
        assert!(!record.has_full_credentials());
    }

    #[test]
    fn low_stock_boundary_is_inclusive() {
        let mut part = SparePartRecord {
            quantity: 5,
            min_quantity: 5,
            ..SparePartRecord::default()
        };
        assert!(part.is_low_stock());
        part.quantity = 6;
        assert!(!part.is_low_stock());
    }
}
