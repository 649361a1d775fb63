mod result;

pub use self::result::Result;
