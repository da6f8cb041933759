use slotmap::new_key_type;

new_key_type! {
    /// Identifies a container in a [`Containers`](crate::container::Containers)
    /// arena. Cheap to copy; stays valid across a clone of the arena.
    pub struct ContainerId;
}
