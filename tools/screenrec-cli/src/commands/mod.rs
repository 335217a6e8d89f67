pub mod check;
pub mod mics;
pub mod record;
pub mod save;
