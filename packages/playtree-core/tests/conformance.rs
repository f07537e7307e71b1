use playtree_core::MemoryPathStore;

#[test]
fn memory_store_conformance() {
    let mut store = MemoryPathStore::new();
    playtree_test_support::run_all(&mut store, "memory");
}
