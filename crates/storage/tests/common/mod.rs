pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{TestStore, backdate, phonetic_identity, translation_identity};
