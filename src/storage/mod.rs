/// Reference files users keep between jobs. Jobs never read from here.
pub mod files;
