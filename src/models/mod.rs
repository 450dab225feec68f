pub mod booking;
pub mod property;
pub mod user;

pub use booking::{
    Booking, BookingRequest, BookingStage, BookingStatus, FoodPreference, VerificationStatus,
};
pub use property::{NewProperty, Property, PropertyPatch};
pub use user::{Identity, Profile, Role};
