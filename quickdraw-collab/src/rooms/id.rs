use crate::util::random_string;

use super::RoomId;

/// Something that can hand out fresh room ids.
///
/// Any `Fn() -> String` is a generator, so tests can pass a closure with
/// predictable output.
pub trait RoomIdGenerator: Send + Sync {
    fn generate(&self) -> RoomId;
}

impl<F> RoomIdGenerator for F
where
    F: Fn() -> RoomId + Send + Sync,
{
    fn generate(&self) -> RoomId {
        self()
    }
}

/// Short, human friendly room ids like `K3Q9Z`
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomRoomIds;

impl RandomRoomIds {
    pub const LENGTH: usize = 5;
    pub const CHARSET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
}

impl RoomIdGenerator for RandomRoomIds {
    fn generate(&self) -> RoomId {
        random_string(Self::LENGTH, Self::CHARSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_room_ids_are_short_and_uppercase() {
        for _ in 0..100 {
            let id = RandomRoomIds.generate();

            assert_eq!(id.len(), RandomRoomIds::LENGTH);
            assert!(id
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_closures_are_generators() {
        let generator = || "ABCDE".to_string();

        assert_eq!(generator.generate(), "ABCDE");
    }
}
