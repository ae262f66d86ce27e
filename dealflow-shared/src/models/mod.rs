pub mod cycle;
pub mod ledger;
pub mod offer;
pub mod raw;
