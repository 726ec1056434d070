use thiserror::Error;

/// Upload problems that abort processing before anything is scored.
#[derive(Error, Debug, PartialEq)]
pub enum UploadError {
    #[error("the uploaded sheet has no data rows")]
    NoDataRows,

    #[error("missing headers: {}", .0.join(", "))]
    MissingHeaders(Vec<String>),

    #[error("unknown campus \"{0}\"")]
    UnknownCampus(String),

    #[error("no rows found for campus {0}")]
    NoRowsForCampus(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum SchemaError {
    #[error("schema must list at least one {0}")]
    Empty(&'static str),

    #[error("duplicate {kind} \"{value}\"")]
    Duplicate { kind: &'static str, value: String },

    #[error("category \"{0}\" reuses an identity header")]
    IdentityCollision(String),

    #[error("expected exactly two council gate categories, found {0}")]
    CouncilGate(usize),

    #[error("category \"{header}\" {reason}")]
    InvalidCategory { header: String, reason: &'static str },
}

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("reward {0} does not exist")]
    RewardNotFound(uuid::Uuid),

    #[error("reward {0} is not active")]
    RewardInactive(uuid::Uuid),

    #[error("house {house} already holds a claim on this reward for {month}")]
    SlotTaken { house: String, month: String },

    #[error("claim {0} does not exist")]
    ClaimNotFound(uuid::Uuid),

    #[error("claim {0} has already been reviewed")]
    NotPending(uuid::Uuid),

    #[error("claims can only be reviewed as approved or rejected")]
    InvalidReview,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Error, Debug, PartialEq)]
#[error("invalid month \"{0}\", expected YYYY-MM")]
pub struct MonthKeyError(pub String);
