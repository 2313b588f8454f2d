/// A type that has a canonical string representation.
pub trait CanonicalStr {
    /// Returns the canonical string representation.
    fn canonical_str(&self) -> &'static str;
}
