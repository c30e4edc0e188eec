use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Request-lifetime memo of successfully loaded values. Entries are never
/// evicted; the memo lives exactly as long as its loader's request.
pub trait Memo {
    type K;
    type V;

    fn get(&self, key: &Self::K) -> Option<&Self::V>;
    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I);
}

impl<K, V, S: BuildHasher> Memo for HashMap<K, V, S>
where
    K: Eq + Hash,
{
    type K = K;
    type V = V;

    fn get(&self, key: &Self::K) -> Option<&Self::V> {
        self.get(key)
    }

    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I) {
        for (key, value) in key_vals.into_iter() {
            self.insert(key, value);
        }
    }
}
