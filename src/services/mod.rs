pub mod admission;
pub mod calendar;
pub mod identity;
pub mod lifecycle;
pub mod pricing;
pub mod storage;
