mod hash;

pub use hash::hash_text;
