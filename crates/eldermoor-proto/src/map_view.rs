//! View-window encoding: full snapshots, floor slices, and move diffs.
//!
//! Everything here writes through one observer's eyes. Creature records
//! consult the session's known-creature cache, so the encoder needs
//! exclusive access to it while it borrows the world read-only; the two
//! borrows come from different owners and stay disjoint.
//!
//! Floor slices run-length encode absent tiles: a skip counter rides along
//! the tile loop and is flushed as a `(count, 0xFF)` marker pair before the
//! next present tile, at 255, and at the end of the slice.

use eldermoor_wire::opcode::{creature_mark, server};
use eldermoor_wire::PacketWriter;
use eldermoor_world::snapshot::{CreatureView, TileView};
use eldermoor_world::viewport::{
    self, BOTTOM_FLOOR, SURFACE_FLOOR, TILE_STACK_LIMIT, UNDERGROUND_DEPTH, VIEW_HEIGHT,
    VIEW_WIDTH,
};
use eldermoor_world::{Position, WorldView};

use crate::known::KnownCreatures;
use crate::outbound::{put_item, put_outfit, remove_tile_thing};

/// Encoder for one observer's view of the map.
pub struct ViewEncoder<'a> {
    world: &'a dyn WorldView,
    known: &'a mut KnownCreatures,
    observer: u32,
}

impl<'a> ViewEncoder<'a> {
    pub fn new(world: &'a dyn WorldView, known: &'a mut KnownCreatures, observer: u32) -> Self {
        Self {
            world,
            known,
            observer,
        }
    }

    /// Whether the observer currently sees `target`.
    pub fn sees(&self, target: Position) -> bool {
        match self.world.creature_position(self.observer) {
            Some(origin) => viewport::in_view(origin, target),
            None => false,
        }
    }

    fn tile_at(&self, x: i32, y: i32, z: u8) -> Option<TileView> {
        let x = u16::try_from(x).ok()?;
        let y = u16::try_from(y).ok()?;
        self.world.tile(Position::new(x, y, z))
    }

    /// One tile: environmental-effects word, then ground, top items,
    /// creatures (newest arrival first), and bottom items, capped at the
    /// tile stack limit.
    pub fn tile_description(&mut self, out: &mut PacketWriter, tile: &TileView) {
        out.put_u16(0x00); // environmental effects
        let mut count = 0usize;
        if let Some(ground) = &tile.ground {
            put_item(out, ground);
            count += 1;
        }

        for item in &tile.top_items {
            if count >= TILE_STACK_LIMIT {
                return;
            }
            put_item(out, item);
            count += 1;
        }

        for &id in tile.creatures.iter().rev() {
            if count >= TILE_STACK_LIMIT {
                return;
            }
            if !self.world.can_observe(self.observer, id) {
                continue;
            }
            let Some(view) = self.world.creature(id) else {
                continue;
            };
            self.creature_record(out, &view);
            count += 1;
        }

        for item in &tile.bottom_items {
            if count >= TILE_STACK_LIMIT {
                return;
            }
            put_item(out, item);
            count += 1;
        }
    }

    /// Full or short creature record, noting the reference in the known
    /// cache and carrying any eviction to the peer.
    pub fn creature_record(&mut self, out: &mut PacketWriter, view: &CreatureView) {
        let world = self.world;
        let observer = self.observer;
        let origin = world.creature_position(observer);
        let reference = self.known.note(view.id, |id| {
            let Some(origin) = origin else {
                return false;
            };
            if !world.can_observe(observer, id) {
                return false;
            }
            match world.creature_position(id) {
                Some(pos) => viewport::in_view(origin, pos),
                None => false,
            }
        });

        if reference.known {
            out.put_u16(creature_mark::KNOWN);
            out.put_u32(view.id);
        } else {
            out.put_u16(creature_mark::UNKNOWN);
            out.put_u32(reference.evicted);
            out.put_u32(view.id);
            out.put_u8(view.kind);
            out.put_string(&view.name);
        }

        out.put_u8(view.health_percent);
        out.put_u8(view.direction.facing_tag());
        put_outfit(out, &view.outfit);
        out.put_u8(view.light.level);
        out.put_u8(view.light.color);
        out.put_u16(view.speed);
        out.put_u8(view.skull);
        out.put_u8(view.party_shield);
        if !reference.known {
            out.put_u8(view.guild_emblem);
        }
        out.put_u8(view.blocks_path as u8);
    }

    /// One floor slice of `width` x `height` tiles. `offset` shifts both
    /// axes by the floor delta so higher floors line up on screen. `skip`
    /// carries the pending run of absent tiles across consecutive slices.
    pub fn floor_description(
        &mut self,
        out: &mut PacketWriter,
        x: i32,
        y: i32,
        z: u8,
        width: u16,
        height: u16,
        offset: i32,
        skip: &mut i32,
    ) {
        for nx in 0..i32::from(width) {
            for ny in 0..i32::from(height) {
                match self.tile_at(x + nx + offset, y + ny + offset, z) {
                    Some(tile) => {
                        if *skip >= 0 {
                            out.put_u8(*skip as u8);
                            out.put_u8(0xFF);
                        }
                        *skip = 0;
                        self.tile_description(out, &tile);
                    }
                    None => {
                        *skip += 1;
                        if *skip == 0xFF {
                            out.put_u8(0xFF);
                            out.put_u8(0xFF);
                            *skip = -1;
                        }
                    }
                }
            }
        }
    }

    /// Every floor visible from `z`, top to bottom on the surface band,
    /// `z` +- 2 ascending underground. The skip run is shared across floors
    /// and flushed at the end.
    pub fn map_description(
        &mut self,
        out: &mut PacketWriter,
        x: i32,
        y: i32,
        z: u8,
        width: u16,
        height: u16,
    ) {
        let mut skip = -1i32;
        if z > SURFACE_FLOOR {
            let start = z - UNDERGROUND_DEPTH;
            let end = BOTTOM_FLOOR.min(z + UNDERGROUND_DEPTH);
            for nz in start..=end {
                let offset = i32::from(z) - i32::from(nz);
                self.floor_description(out, x, y, nz, width, height, offset, &mut skip);
            }
        } else {
            for nz in (0..=SURFACE_FLOOR).rev() {
                let offset = i32::from(z) - i32::from(nz);
                self.floor_description(out, x, y, nz, width, height, offset, &mut skip);
            }
        }

        if skip >= 0 {
            out.put_u8(skip as u8);
            out.put_u8(0xFF);
        }
    }

    /// Full map snapshot centred on `center` (login, teleport, reconnect).
    pub fn full_map(&mut self, out: &mut PacketWriter, center: Position) {
        out.put_u8(server::MAP_FULL);
        center.write_to(out);
        self.map_description(
            out,
            i32::from(center.x) - 8,
            i32::from(center.y) - 6,
            center.z,
            VIEW_WIDTH,
            VIEW_HEIGHT,
        );
    }

    /// Refresh one tile in place; an absent tile clears client-side.
    pub fn update_tile(&mut self, out: &mut PacketWriter, pos: Position) {
        out.put_u8(server::TILE_UPDATE);
        pos.write_to(out);
        match self.world.tile(pos) {
            Some(tile) => {
                self.tile_description(out, &tile);
                out.put_u8(0x00);
                out.put_u8(0xFF);
            }
            None => {
                out.put_u8(0x01);
                out.put_u8(0xFF);
            }
        }
    }

    /// A creature stepping into view at `pos` (stack indexes past the tile
    /// limit are not encodable and stay off the wire).
    pub fn tile_creature(
        &mut self,
        out: &mut PacketWriter,
        pos: Position,
        stack: u8,
        view: &CreatureView,
    ) {
        if usize::from(stack) >= TILE_STACK_LIMIT {
            return;
        }
        out.put_u8(server::TILE_ADD_THING);
        pos.write_to(out);
        out.put_u8(stack);
        self.creature_record(out, view);
    }

    /// The observer's own move. Steps use the compact move op plus edge
    /// strips for the freshly exposed row/column; teleports and overflowing
    /// stack indexes degrade to remove-plus-snapshot.
    pub fn own_moved(
        &mut self,
        out: &mut PacketWriter,
        old: Position,
        old_stack: u8,
        new: Position,
        teleported: bool,
    ) {
        if teleported || usize::from(old_stack) >= TILE_STACK_LIMIT {
            remove_tile_thing(out, old, old_stack);
            self.full_map(out, new);
            return;
        }

        // Dropping below the surface hides the old floor entirely, so the
        // move op degrades to a removal before the floor-change slice.
        if old.z != SURFACE_FLOOR || new.z < SURFACE_FLOOR + 1 {
            out.put_u8(server::CREATURE_MOVE);
            old.write_to(out);
            out.put_u8(old_stack);
            new.write_to(out);
        } else {
            remove_tile_thing(out, old, old_stack);
        }

        if new.z > old.z {
            self.floor_change_down(out, old, new);
        } else if new.z < old.z {
            self.floor_change_up(out, old, new);
        }

        if old.y > new.y {
            out.put_u8(server::MAP_NORTH_ROW);
            self.map_description(
                out,
                i32::from(old.x) - 8,
                i32::from(new.y) - 6,
                new.z,
                VIEW_WIDTH,
                1,
            );
        } else if old.y < new.y {
            out.put_u8(server::MAP_SOUTH_ROW);
            self.map_description(
                out,
                i32::from(old.x) - 8,
                i32::from(new.y) + 7,
                new.z,
                VIEW_WIDTH,
                1,
            );
        }

        if old.x < new.x {
            out.put_u8(server::MAP_EAST_COL);
            self.map_description(
                out,
                i32::from(new.x) + 9,
                i32::from(new.y) - 6,
                new.z,
                1,
                VIEW_HEIGHT,
            );
        } else if old.x > new.x {
            out.put_u8(server::MAP_WEST_COL);
            self.map_description(
                out,
                i32::from(new.x) - 8,
                i32::from(new.y) - 6,
                new.z,
                1,
                VIEW_HEIGHT,
            );
        }
    }

    /// Another creature's move as this observer sees it. Falls back to
    /// remove-plus-add when the compact op cannot express it; a creature
    /// crossing out of or into view emits only the half the observer sees.
    pub fn creature_moved(
        &mut self,
        out: &mut PacketWriter,
        view: &CreatureView,
        old: Position,
        old_stack: u8,
        new: Position,
        new_stack: u8,
        teleported: bool,
    ) {
        if !self.world.can_observe(self.observer, view.id) {
            return;
        }

        let sees_old = self.sees(old);
        let sees_new = self.sees(new);
        if sees_old && sees_new {
            if !teleported
                && (old.z != SURFACE_FLOOR || new.z < SURFACE_FLOOR + 1)
                && usize::from(old_stack) < TILE_STACK_LIMIT
            {
                out.put_u8(server::CREATURE_MOVE);
                old.write_to(out);
                out.put_u8(old_stack);
                new.write_to(out);
            } else {
                remove_tile_thing(out, old, old_stack);
                self.tile_creature(out, new, new_stack, view);
            }
        } else if sees_old {
            remove_tile_thing(out, old, old_stack);
        } else if sees_new {
            self.tile_creature(out, new, new_stack, view);
        }
    }

    /// Floor slice and edge strips after the observer moved one floor up.
    pub fn floor_change_up(&mut self, out: &mut PacketWriter, old: Position, new: Position) {
        out.put_u8(server::FLOOR_UP);
        let base_x = i32::from(old.x) - 8;
        let base_y = i32::from(old.y) - 6;

        if new.z == SURFACE_FLOOR {
            // Surfacing exposes the whole above-ground band; floors 7 and 6
            // were already visible from underground.
            let mut skip = -1i32;
            for z in (0..=5u8).rev() {
                let offset = 8 - i32::from(z);
                self.floor_description(
                    out,
                    base_x,
                    base_y,
                    z,
                    VIEW_WIDTH,
                    VIEW_HEIGHT,
                    offset,
                    &mut skip,
                );
            }
            flush_skip(out, skip);
        } else if new.z > SURFACE_FLOOR {
            let mut skip = -1i32;
            self.floor_description(
                out,
                base_x,
                base_y,
                old.z - 3,
                VIEW_WIDTH,
                VIEW_HEIGHT,
                3,
                &mut skip,
            );
            flush_skip(out, skip);
        }

        // The vertical shift leaves one column and one row stale.
        out.put_u8(server::MAP_WEST_COL);
        self.map_description(out, base_x, i32::from(old.y) + 1 - 6, new.z, 1, VIEW_HEIGHT);
        out.put_u8(server::MAP_NORTH_ROW);
        self.map_description(out, base_x, base_y, new.z, VIEW_WIDTH, 1);
    }

    /// Floor slice and edge strips after the observer moved one floor down.
    pub fn floor_change_down(&mut self, out: &mut PacketWriter, old: Position, new: Position) {
        out.put_u8(server::FLOOR_DOWN);
        let base_x = i32::from(old.x) - 8;
        let base_y = i32::from(old.y) - 6;

        if new.z == SURFACE_FLOOR + 1 {
            // Leaving the surface swaps the whole band for the first three
            // underground floors.
            let mut skip = -1i32;
            for step in 0..=2u8 {
                let z = new.z + step;
                let offset = -1 - i32::from(step);
                self.floor_description(
                    out,
                    base_x,
                    base_y,
                    z,
                    VIEW_WIDTH,
                    VIEW_HEIGHT,
                    offset,
                    &mut skip,
                );
            }
            flush_skip(out, skip);
        } else if new.z > old.z && new.z > SURFACE_FLOOR + 1 && new.z < BOTTOM_FLOOR - 1 {
            let mut skip = -1i32;
            self.floor_description(
                out,
                base_x,
                base_y,
                new.z + 2,
                VIEW_WIDTH,
                VIEW_HEIGHT,
                -3,
                &mut skip,
            );
            flush_skip(out, skip);
        }

        out.put_u8(server::MAP_EAST_COL);
        let east_x = i32::from(old.x) + 9;
        self.map_description(out, east_x, i32::from(old.y) - 1 - 6, new.z, 1, VIEW_HEIGHT);
        out.put_u8(server::MAP_SOUTH_ROW);
        self.map_description(out, base_x, i32::from(old.y) + 7, new.z, VIEW_WIDTH, 1);
    }
}

fn flush_skip(out: &mut PacketWriter, skip: i32) {
    if skip >= 0 {
        out.put_u8(skip as u8);
        out.put_u8(0xFF);
    }
}
