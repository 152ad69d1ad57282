pub mod admin_flag;
