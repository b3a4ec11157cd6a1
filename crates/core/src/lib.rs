pub mod merge;
pub mod record;
pub mod resolve;

pub use merge::merge;
pub use record::{
    CanonicalEntity, CanonicalTransaction, Domain, DomainParseError, NormalizedRecords,
    PortfolioPosition, RawRecord, Scenario,
};
pub use resolve::{render_scalar, resolve, resolve_string};
