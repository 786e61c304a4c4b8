//! Core types for serialbox
//!
//! This crate defines the foundational types used throughout the system:
//! - Error: Error type hierarchy
//! - MetaValue / MetainfoSet: typed key-value metadata
//! - Savepoint: named, metainfo-qualified capture point
//! - DataFieldInfo: field description (type, extents, halos, metainfo)
//! - ElementType, Precision, Endianness: scalar encoding parameters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod field_info;
pub mod metainfo;
pub mod savepoint;
pub mod types;

pub use error::{Error, Result};
pub use field_info::{DataFieldInfo, Dims, Halo};
pub use metainfo::{MetaEntry, MetaValue, MetainfoSet};
pub use savepoint::Savepoint;
pub use types::{ElementType, Endianness, Precision};

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn meta_value() -> impl Strategy<Value = MetaValue> {
        prop_oneof![
            any::<bool>().prop_map(MetaValue::Bool),
            any::<i32>().prop_map(MetaValue::Int32),
            any::<i64>().prop_map(MetaValue::Int64),
            any::<f32>().prop_map(MetaValue::Float32),
            any::<f64>().prop_map(MetaValue::Float64),
            "[a-z]{0,8}".prop_map(MetaValue::String),
        ]
    }

    fn entries() -> impl Strategy<Value = Vec<(String, MetaValue)>> {
        prop::collection::btree_map("[a-z]{1,6}", meta_value(), 0..6)
            .prop_map(|m| m.into_iter().collect())
    }

    fn shuffled_pair() -> impl Strategy<Value = (Vec<(String, MetaValue)>, Vec<(String, MetaValue)>)> {
        entries().prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    }

    proptest! {
        #[test]
        fn savepoint_equality_independent_of_insertion_order(
            name in "[a-z]{1,8}",
            (forward, shuffled) in shuffled_pair(),
        ) {
            let mut a = Savepoint::new(name.clone());
            for (k, v) in forward {
                a = a.with(k, v);
            }
            let mut b = Savepoint::new(name);
            for (k, v) in shuffled {
                b = b.with(k, v);
            }
            prop_assert_eq!(a, b);
        }

        #[test]
        fn savepoint_equality_requires_same_name(
            a in "[a-z]{1,8}",
            b in "[a-z]{1,8}",
        ) {
            let sa = Savepoint::new(a.clone()).with("k", 1i32);
            let sb = Savepoint::new(b.clone()).with("k", 1i32);
            prop_assert_eq!(sa == sb, a == b);
        }
    }
}
