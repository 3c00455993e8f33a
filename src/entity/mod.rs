pub mod audit_logs;
pub mod color_tiles;
pub mod hero_images;
pub mod orders;
pub mod products;
pub mod student_verifications;
pub mod subscribers;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use color_tiles::Entity as ColorTiles;
pub use hero_images::Entity as HeroImages;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use student_verifications::Entity as StudentVerifications;
pub use subscribers::Entity as Subscribers;
pub use users::Entity as Users;
