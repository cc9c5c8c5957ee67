use memory::{DenseMemory, GuestMemory, SparseMemory};
use proptest::prelude::*;

const SIZE: u64 = 256;

fn write_op() -> impl Strategy<Value = (u64, Vec<u8>)> {
    (0..SIZE).prop_flat_map(|addr| {
        let max_len = (SIZE - addr) as usize;
        (Just(addr), prop::collection::vec(any::<u8>(), 0..=max_len.min(40)))
    })
}

proptest! {
    #[test]
    fn sparse_and_dense_agree_after_arbitrary_writes(ops in prop::collection::vec(write_op(), 1..32)) {
        let mut dense = DenseMemory::new(SIZE).unwrap();
        let mut sparse = SparseMemory::with_chunk_size(SIZE, 16).unwrap();

        for (addr, bytes) in &ops {
            dense.write_from(*addr, bytes).unwrap();
            sparse.write_from(*addr, bytes).unwrap();
        }

        prop_assert_eq!(
            dense.read_vec(0, SIZE as usize).unwrap(),
            sparse.read_vec(0, SIZE as usize).unwrap()
        );
    }

    #[test]
    fn accesses_past_the_end_fail_on_both_backends(addr in (SIZE - 8)..(SIZE + 8), len in 1usize..16) {
        let dense = DenseMemory::new(SIZE).unwrap();
        let sparse = SparseMemory::with_chunk_size(SIZE, 16).unwrap();
        let in_range = addr + len as u64 <= SIZE;

        prop_assert_eq!(dense.read_vec(addr, len).is_ok(), in_range);
        prop_assert_eq!(sparse.read_vec(addr, len).is_ok(), in_range);
    }
}
