use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Outcome of removing one value from a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    NotFound,
    Removed { now_empty: bool },
}

/// How values are kept under one key.
pub trait ValueMode {
    type Value: Clone + PartialEq + Serialize + DeserializeOwned;
    type Slot: Clone + Serialize + DeserializeOwned;

    /// Whether a key may carry several values.
    const MULTI: bool;

    fn new_slot(value: Self::Value) -> Self::Slot;

    /// Add `value` to an existing slot. Returns the number of associations
    /// gained.
    fn absorb(slot: &mut Self::Slot, value: Self::Value) -> u64;

    /// Number of associations held.
    fn len(slot: &Self::Slot) -> u64;

    fn remove(slot: &mut Self::Slot, value: &Self::Value) -> Removal;

    /// Values in insertion order.
    fn values(slot: &Self::Slot) -> Vec<Self::Value>;
}

/// One value per key; a duplicate insert replaces it.
pub struct Single<V>(PhantomData<fn() -> V>);

impl<V> ValueMode for Single<V>
where
    V: Clone + PartialEq + Serialize + DeserializeOwned,
{
    type Value = V;
    type Slot = V;

    const MULTI: bool = false;

    fn new_slot(value: V) -> V {
        value
    }

    fn absorb(slot: &mut V, value: V) -> u64 {
        *slot = value;
        0
    }

    fn len(_slot: &V) -> u64 {
        1
    }

    fn remove(slot: &mut V, value: &V) -> Removal {
        if slot == value {
            Removal::Removed { now_empty: true }
        } else {
            Removal::NotFound
        }
    }

    fn values(slot: &V) -> Vec<V> {
        vec![slot.clone()]
    }
}

/// Any number of values per key, kept in insertion order.
pub struct Multi<V>(PhantomData<fn() -> V>);

impl<V> ValueMode for Multi<V>
where
    V: Clone + PartialEq + Serialize + DeserializeOwned,
{
    type Value = V;
    type Slot = Vec<V>;

    const MULTI: bool = true;

    fn new_slot(value: V) -> Vec<V> {
        vec![value]
    }

    fn absorb(slot: &mut Vec<V>, value: V) -> u64 {
        slot.push(value);
        1
    }

    fn len(slot: &Vec<V>) -> u64 {
        slot.len() as u64
    }

    fn remove(slot: &mut Vec<V>, value: &V) -> Removal {
        match slot.iter().position(|v| v == value) {
            Some(index) => {
                slot.remove(index);
                Removal::Removed {
                    now_empty: slot.is_empty(),
                }
            }
            None => Removal::NotFound,
        }
    }

    fn values(slot: &Vec<V>) -> Vec<V> {
        slot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_replaces() {
        let mut slot = Single::<u32>::new_slot(1);
        assert_eq!(Single::<u32>::absorb(&mut slot, 2), 0);
        assert_eq!(slot, 2);
        assert_eq!(Single::<u32>::remove(&mut slot, &1), Removal::NotFound);
        assert_eq!(
            Single::<u32>::remove(&mut slot, &2),
            Removal::Removed { now_empty: true }
        );
    }

    #[test]
    fn multi_appends_in_order() {
        let mut slot = Multi::<String>::new_slot("a".into());
        assert_eq!(Multi::<String>::absorb(&mut slot, "b".into()), 1);
        assert_eq!(Multi::<String>::absorb(&mut slot, "c".into()), 1);
        assert_eq!(Multi::<String>::len(&slot), 3);

        assert_eq!(
            Multi::<String>::remove(&mut slot, &"b".to_string()),
            Removal::Removed { now_empty: false }
        );
        assert_eq!(Multi::<String>::values(&slot), vec!["a".to_string(), "c".to_string()]);
        assert_eq!(Multi::<String>::remove(&mut slot, &"z".to_string()), Removal::NotFound);
    }

    #[test]
    fn multi_removes_first_duplicate_only() {
        let mut slot = Multi::<u8>::new_slot(1);
        Multi::<u8>::absorb(&mut slot, 1);
        Multi::<u8>::remove(&mut slot, &1);
        assert_eq!(slot, vec![1]);
    }
}
