//! Viewport rules: what a player standing somewhere can be told about.
//!
//! The client renders an 18x14 tile window centred slightly off the player
//! (8 west, 9 east, 6 north, 7 south). Floors compress into the same window:
//! a surface observer (z <= 7) sees the whole above-ground column 7..0, an
//! underground observer sees two floors either side of their own. When
//! observer and target are on different floors the window shifts by the
//! floor delta, matching the client's perspective offset.

use crate::position::Position;

/// Window width in tiles: x-8 .. x+9.
pub const VIEW_WIDTH: u16 = 18;
/// Window height in tiles: y-6 .. y+7.
pub const VIEW_HEIGHT: u16 = 14;
/// Highest floor index; floors run 0..=15.
pub const BOTTOM_FLOOR: u8 = 15;
/// The ground floor. Everything above it is open sky.
pub const SURFACE_FLOOR: u8 = 7;
/// How many floors an underground observer sees in each direction.
pub const UNDERGROUND_DEPTH: u8 = 2;
/// A tile describes at most this many things (ground included).
pub const TILE_STACK_LIMIT: usize = 10;

/// Whether `target` is inside the viewport of an observer at `observer`.
pub fn in_view(observer: Position, target: Position) -> bool {
    if observer.z <= SURFACE_FLOOR {
        // Surface viewers never see below ground.
        if target.z > SURFACE_FLOOR {
            return false;
        }
    } else if (i16::from(observer.z) - i16::from(target.z)).unsigned_abs()
        > u16::from(UNDERGROUND_DEPTH)
    {
        return false;
    }

    // The horizontal window shifts with the floor delta.
    let dz = i32::from(observer.z) - i32::from(target.z);
    let x = i32::from(target.x);
    let y = i32::from(target.y);
    let ox = i32::from(observer.x);
    let oy = i32::from(observer.y);

    x >= ox - 8 + dz && x <= ox + 9 + dz && y >= oy - 6 + dz && y <= oy + 7 + dz
}
