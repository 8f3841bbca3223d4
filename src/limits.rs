//! Hard caps that keep one misbehaving client from exhausting memory.

pub const MAX_ROOMS: usize = 10_000;
pub const MAX_RESERVATIONS_PER_ROOM: usize = 50_000;
pub const MAX_SQL_LEN: usize = 64 * 1024;
pub const MAX_LIST_ROWS: usize = 100_000;
