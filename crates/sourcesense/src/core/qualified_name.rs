//! Qualified name construction.
//!
//! A qualified name is an entity's identity key downstream. It is the ordered
//! path segments joined with [`SEPARATOR`]:
//!
//! ```text
//! connection / database / schema / table / column
//! ```
//!
//! Coarser kinds omit trailing segments. Empty segments keep their position,
//! so `["c", "", "s"]` and `["c", "s"]` never collide. Segments are used as
//! given: no trimming and no case folding.

/// Segment separator.
pub const SEPARATOR: char = '/';

/// Join ordered path segments into a qualified name.
pub fn build_qualified_name<S: AsRef<str>>(segments: &[S]) -> String {
    let capacity = segments.iter().map(|s| s.as_ref().len() + 1).sum();
    let mut name = String::with_capacity(capacity);
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            name.push(SEPARATOR);
        }
        name.push_str(segment.as_ref());
    }
    name
}
