pub mod admin_flag_repo;

pub use admin_flag_repo::AdminFlagRepo;
