//! Map coordinates and step directions.

use std::fmt;

use eldermoor_wire::{PacketReader, PacketWriter, ReadError};

/// A map coordinate. Floors run 0 (top of the sky) to 15 (deepest level);
/// 7 is the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

impl Position {
    pub fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    /// True below the surface floor.
    pub fn is_underground(&self) -> bool {
        self.z > 7
    }

    /// The neighbouring coordinate one step away, or `None` at the map edge.
    pub fn step(&self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.delta();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        Some(Position { x, y, z: self.z })
    }

    /// Wire layout: x:u16, y:u16, z:u8.
    pub fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, ReadError> {
        let x = reader.get_u16()?;
        let y = reader.get_u16()?;
        let z = reader.get_u8()?;
        Ok(Self { x, y, z })
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        writer.put_u16(self.x);
        writer.put_u16(self.y);
        writer.put_u8(self.z);
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Step direction. Cardinals double as facing directions; creatures only
/// ever face a cardinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl Direction {
    /// (dx, dy) of one step; y grows southward.
    pub fn delta(self) -> (i16, i16) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
            Direction::NorthWest => (-1, -1),
        }
    }

    /// Facing byte the server sends inside creature records: 0 north,
    /// 1 east, 2 south, 3 west. Diagonals report their horizontal half.
    pub fn facing_tag(self) -> u8 {
        match self {
            Direction::North => 0,
            Direction::East | Direction::NorthEast | Direction::SouthEast => 1,
            Direction::South => 2,
            Direction::West | Direction::NorthWest | Direction::SouthWest => 3,
        }
    }

    /// Path step tag used by the auto-walk opcode: 1 east, 2 north-east, 3
    /// north, 4 north-west, 5 west, 6 south-west, 7 south, 8 south-east.
    pub fn from_path_tag(tag: u8) -> Option<Direction> {
        match tag {
            1 => Some(Direction::East),
            2 => Some(Direction::NorthEast),
            3 => Some(Direction::North),
            4 => Some(Direction::NorthWest),
            5 => Some(Direction::West),
            6 => Some(Direction::SouthWest),
            7 => Some(Direction::South),
            8 => Some(Direction::SouthEast),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_wire_roundtrip() {
        let pos = Position::new(0x7B2, 0x4A1, 9);
        let mut w = PacketWriter::new();
        pos.write_to(&mut w);
        assert_eq!(w.len(), 5, "position is exactly five bytes");

        let mut r = PacketReader::new(w.as_slice());
        assert_eq!(Position::read_from(&mut r).unwrap(), pos);
    }

    #[test]
    fn test_step_clamps_at_map_origin() {
        let origin = Position::new(0, 0, 7);
        assert_eq!(origin.step(Direction::North), None);
        assert_eq!(origin.step(Direction::West), None);
        assert_eq!(
            origin.step(Direction::SouthEast),
            Some(Position::new(1, 1, 7))
        );
    }

    #[test]
    fn test_path_tags_cover_all_eight_steps() {
        for tag in 1..=8 {
            let dir = Direction::from_path_tag(tag).unwrap();
            let (dx, dy) = dir.delta();
            assert!(dx != 0 || dy != 0);
        }
        assert_eq!(Direction::from_path_tag(0), None);
        assert_eq!(Direction::from_path_tag(9), None);
    }

    #[test]
    fn test_facing_tags_are_cardinal() {
        assert_eq!(Direction::North.facing_tag(), 0);
        assert_eq!(Direction::East.facing_tag(), 1);
        assert_eq!(Direction::South.facing_tag(), 2);
        assert_eq!(Direction::West.facing_tag(), 3);
        assert_eq!(Direction::SouthWest.facing_tag(), 3);
    }

    #[test]
    fn test_underground_starts_below_surface() {
        assert!(!Position::new(100, 100, 7).is_underground());
        assert!(Position::new(100, 100, 8).is_underground());
    }
}
