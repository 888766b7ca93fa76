pub fn new_boxed_option_slice<T>(size: usize) -> Box<[Option<T>]> {
    let mut vector = Vec::with_capacity(size);
    for _ in 0 .. size {
        vector.push(None)
    }
    vector.into_boxed_slice()
}

/// The bucket a hash code lands in, for a power-of-two bucket count.
pub fn index_for(hash_code: u64, len: usize) -> usize {
    hash_code as usize & (len - 1)
}
