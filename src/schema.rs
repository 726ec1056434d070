//! Point schema: which houses and campuses exist, which sheet headers
//! identify a student, and how every point category feeds the score
//! buckets.
//!
//! A built-in default mirrors the current sheet layout. Deployments can
//! supply their own schema as JSON so that a new or renamed category does
//! not need a code change.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    IndividualAcademic,
    IndividualCulture,
    HouseAcademic,
    HouseCulture,
    Council,
}

impl Bucket {
    fn is_culture(self) -> bool {
        matches!(self, Bucket::IndividualCulture | Bucket::HouseCulture)
    }

    fn is_house(self) -> bool {
        matches!(self, Bucket::HouseAcademic | Bucket::HouseCulture)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Reward,
    Penalty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub header: String,
    pub bucket: Bucket,
    pub polarity: Polarity,
    /// Credited once to the house total on top of the member average.
    #[serde(default)]
    pub dual_effect: bool,
    /// A positive value here makes the student council-active.
    #[serde(default)]
    pub council_gate: bool,
    /// Life events that must not decide the monthly cultural award.
    #[serde(default)]
    pub excluded_from_cultural_winner: bool,
}

impl Category {
    /// True when a cell carries the opposite sign to the category, such
    /// as a negative value under a reward column. The value still counts
    /// as entered.
    pub fn is_wrong_sign(&self, raw: f64) -> bool {
        match self.polarity {
            Polarity::Reward => raw < 0.0,
            Polarity::Penalty => raw > 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityHeaders {
    pub student_name: String,
    pub house: String,
    pub campus: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSchema {
    pub houses: Vec<String>,
    pub campuses: Vec<String>,
    pub identity: IdentityHeaders,
    pub categories: Vec<Category>,
}

impl PointSchema {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema {}", path.display()))?;
        let schema: PointSchema = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse schema {}", path.display()))?;
        schema
            .validate()
            .with_context(|| format!("invalid schema {}", path.display()))?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.houses.is_empty() {
            return Err(SchemaError::Empty("house"));
        }
        if self.campuses.is_empty() {
            return Err(SchemaError::Empty("campus"));
        }
        if self.categories.is_empty() {
            return Err(SchemaError::Empty("category"));
        }

        ensure_unique("house", self.houses.iter())?;
        ensure_unique("campus", self.campuses.iter())?;
        ensure_unique(
            "header",
            self.identity_headers()
                .into_iter()
                .chain(self.categories.iter().map(|c| c.header.as_str())),
        )
        .map_err(|err| match err {
            SchemaError::Duplicate { value, .. } => SchemaError::IdentityCollision(value),
            other => other,
        })?;

        for category in &self.categories {
            if category.header.trim().is_empty() {
                return Err(SchemaError::InvalidCategory {
                    header: category.header.clone(),
                    reason: "has an empty header",
                });
            }
            if category.dual_effect && !category.bucket.is_house() {
                return Err(SchemaError::InvalidCategory {
                    header: category.header.clone(),
                    reason: "is dual-effect but not a house contribution",
                });
            }
            if category.council_gate && category.bucket != Bucket::Council {
                return Err(SchemaError::InvalidCategory {
                    header: category.header.clone(),
                    reason: "is a council gate outside the council bucket",
                });
            }
            if category.excluded_from_cultural_winner && !category.bucket.is_culture() {
                return Err(SchemaError::InvalidCategory {
                    header: category.header.clone(),
                    reason: "is excluded from the cultural award but is not a culture category",
                });
            }
        }

        let gates = self.categories.iter().filter(|c| c.council_gate).count();
        if gates != 2 {
            return Err(SchemaError::CouncilGate(gates));
        }

        Ok(())
    }

    pub fn identity_headers(&self) -> [&str; 4] {
        [
            self.identity.student_name.as_str(),
            self.identity.house.as_str(),
            self.identity.campus.as_str(),
            self.identity.email.as_str(),
        ]
    }

    /// Identity headers first, then every category header.
    pub fn required_headers(&self) -> Vec<&str> {
        self.identity_headers()
            .into_iter()
            .chain(self.categories.iter().map(|c| c.header.as_str()))
            .collect()
    }
}

fn ensure_unique<I, S>(kind: &'static str, values: I) -> Result<(), SchemaError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    for value in values {
        let value = value.as_ref();
        if !seen.insert(value.trim().to_lowercase()) {
            return Err(SchemaError::Duplicate {
                kind,
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

impl Default for PointSchema {
    fn default() -> Self {
        use Bucket::*;
        use Polarity::*;

        let category = |header: &str, bucket: Bucket, polarity: Polarity| Category {
            header: header.to_string(),
            bucket,
            polarity,
            dual_effect: false,
            council_gate: false,
            excluded_from_cultural_winner: false,
        };
        let dual = |header: &str, bucket: Bucket| Category {
            dual_effect: true,
            ..category(header, bucket, Reward)
        };
        let gate = |header: &str| Category {
            council_gate: true,
            ..category(header, Council, Reward)
        };
        let life_event = |header: &str, polarity: Polarity| Category {
            excluded_from_cultural_winner: true,
            ..category(header, IndividualCulture, polarity)
        };

        Self {
            houses: ["Bageshree", "Bhairav", "Malhar", "Yaman"]
                .map(String::from)
                .to_vec(),
            campuses: [
                "Pune",
                "Mumbai",
                "Dharamshala",
                "Sarjapur",
                "Raipur",
                "Udaipur",
                "Kishanganj",
                "Jashpur",
            ]
            .map(String::from)
            .to_vec(),
            identity: IdentityHeaders {
                student_name: "Student Name".to_string(),
                house: "House".to_string(),
                campus: "Campus".to_string(),
                email: "Email".to_string(),
            },
            categories: vec![
                category("Module Completion (+5)", IndividualAcademic, Reward),
                category("Additional Effort (+1)", IndividualAcademic, Reward),
                category("Peer Teaching (+3)", IndividualAcademic, Reward),
                category("Project Showcase (+4)", IndividualAcademic, Reward),
                category("Assessment Topper (+5)", IndividualAcademic, Reward),
                category("Event Participation (+2)", IndividualCulture, Reward),
                category("Event Organising (+3)", IndividualCulture, Reward),
                category("Volunteering (+2)", IndividualCulture, Reward),
                category("Sports Achievement (+3)", IndividualCulture, Reward),
                life_event("Getting a Job (+15)", Reward),
                life_event("Dropout (-15)", Penalty),
                category("Discipline Violation (-5)", IndividualCulture, Penalty),
                dual("House Study Session (+2)", HouseAcademic),
                category("Helping Housemate (+1)", HouseAcademic, Reward),
                dual("House Academic Challenge (+3)", HouseAcademic),
                dual("House Event Win (+5)", HouseCulture),
                category("House Cleanliness (+1)", HouseCulture, Reward),
                gate("Council Activeness (+2)"),
                gate("Council Responsibility (+3)"),
            ],
        }
    }
}
