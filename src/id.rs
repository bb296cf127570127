use ulid::Ulid;

/// Identifier of an on-disk block, assigned when the block is written.
pub type BlockId = Ulid;
