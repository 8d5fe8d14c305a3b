// Services module

pub mod cloudinary;
pub mod firestore;
pub mod identity;

pub use cloudinary::CloudinaryService;
pub use firestore::FirestoreService;
pub use identity::{AuthSession, IdentityError, IdentityToolkit};
