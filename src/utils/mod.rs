pub mod db_utils;
pub mod pagination;
pub mod rate_cache;
pub mod rif;
pub mod sequences;
pub mod text;
