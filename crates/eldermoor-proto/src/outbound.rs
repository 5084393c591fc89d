//! Flat encoders for every server-to-client message that does not need the
//! observer's known-creature cache. Each function appends one complete
//! message to the session's pending writer; framing happens at flush.
//!
//! Layout quirks are the client's, not ours: effect ids go on the wire
//! one-based, the text-window length word precedes the length-prefixed
//! string, and list counts saturate at one byte.

use eldermoor_wire::message::{MessageClass, MessageDetails};
use eldermoor_wire::opcode::{creature_mark, server};
use eldermoor_wire::PacketWriter;
use eldermoor_world::snapshot::{
    ContainerView, GoodsEntry, ItemView, MountChoice, Outfit, OutfitChoice, PlayerStats,
    QuestLine, QuestMission, ShopEntry, SkillSet,
};
use eldermoor_world::viewport::TILE_STACK_LIMIT;
use eldermoor_world::{ChannelInfo, Direction, LightInfo, Position};

const LIST_BYTE_CAP: usize = 0xFF;

/// Item type id plus the count or subtype byte for types that carry one.
pub fn put_item(out: &mut PacketWriter, item: &ItemView) {
    out.put_u16(item.client_id);
    if let Some(count) = item.count {
        out.put_u8(count);
    }
}

/// Outfit block: colours for a real outfit, the disguise item type for
/// look type zero, then the mount type.
pub fn put_outfit(out: &mut PacketWriter, outfit: &Outfit) {
    out.put_u16(outfit.look_type);
    if outfit.look_type != 0 {
        out.put_u8(outfit.head);
        out.put_u8(outfit.body);
        out.put_u8(outfit.legs);
        out.put_u8(outfit.feet);
        out.put_u8(outfit.addons);
    } else {
        out.put_u16(outfit.item_disguise);
    }
    out.put_u16(outfit.mount);
}

// --- connection lifecycle ---

/// Hello sent right after accept, before the first client frame. The nonce
/// bytes are noise the client echoes nowhere.
pub fn greeting(out: &mut PacketWriter, nonce: u16, salt: u8) {
    out.put_u8(server::GREETING);
    out.put_u16(nonce);
    out.put_u16(0x00);
    out.put_u8(salt);
}

pub fn ping(out: &mut PacketWriter) {
    out.put_u8(server::PING);
}

/// Refusal box; the client shows `reason` and drops the connection.
pub fn disconnect(out: &mut PacketWriter, reason: &str) {
    out.put_u8(server::DISCONNECT);
    out.put_string(reason);
}

pub fn fyi_box(out: &mut PacketWriter, text: &str) {
    out.put_u8(server::FYI_BOX);
    out.put_string(text);
}

pub fn waiting_list(out: &mut PacketWriter, message: &str, retry_secs: u8) {
    out.put_u8(server::WAITING_LIST);
    out.put_string(message);
    out.put_u8(retry_secs);
}

/// Header of the login-success bundle: the creature id the client will be,
/// a fixed client-side render speed, and the bug-report toggle.
pub fn login_success(out: &mut PacketWriter, creature: u32, can_report_bugs: bool) {
    out.put_u8(server::LOGIN_SUCCESS);
    out.put_u32(creature);
    out.put_u16(0x32);
    out.put_u8(can_report_bugs as u8);
}

pub fn relogin_window(out: &mut PacketWriter, pvp_frame_percent: u8) {
    out.put_u8(server::RELOGIN_WINDOW);
    out.put_u8(pvp_frame_percent);
}

// --- tiles and things ---

pub fn tile_item_added(out: &mut PacketWriter, pos: Position, stack: u8, item: &ItemView) {
    if usize::from(stack) >= TILE_STACK_LIMIT {
        return;
    }
    out.put_u8(server::TILE_ADD_THING);
    pos.write_to(out);
    out.put_u8(stack);
    put_item(out, item);
}

pub fn tile_item_updated(out: &mut PacketWriter, pos: Position, stack: u8, item: &ItemView) {
    if usize::from(stack) >= TILE_STACK_LIMIT {
        return;
    }
    out.put_u8(server::TILE_TRANSFORM_THING);
    pos.write_to(out);
    out.put_u8(stack);
    put_item(out, item);
}

/// Remove op for any thing on a tile, creature or item.
pub fn remove_tile_thing(out: &mut PacketWriter, pos: Position, stack: u8) {
    if usize::from(stack) >= TILE_STACK_LIMIT {
        return;
    }
    out.put_u8(server::TILE_REMOVE_THING);
    pos.write_to(out);
    out.put_u8(stack);
}

/// In-place turn: a transform op whose payload is a creature reference.
pub fn creature_turn(
    out: &mut PacketWriter,
    pos: Position,
    stack: u8,
    creature: u32,
    direction: Direction,
) {
    if usize::from(stack) >= TILE_STACK_LIMIT {
        return;
    }
    out.put_u8(server::TILE_TRANSFORM_THING);
    pos.write_to(out);
    out.put_u8(stack);
    out.put_u16(creature_mark::REFERENCE);
    out.put_u32(creature);
    out.put_u8(direction.facing_tag());
}

// --- ambient and per-creature updates ---

pub fn world_light(out: &mut PacketWriter, light: LightInfo) {
    out.put_u8(server::WORLD_LIGHT);
    out.put_u8(light.level);
    out.put_u8(light.color);
}

pub fn magic_effect(out: &mut PacketWriter, pos: Position, effect: u8) {
    out.put_u8(server::MAGIC_EFFECT);
    pos.write_to(out);
    out.put_u8(effect + 1);
}

pub fn distance_shot(out: &mut PacketWriter, from: Position, to: Position, effect: u8) {
    out.put_u8(server::DISTANCE_SHOT);
    from.write_to(out);
    to.write_to(out);
    out.put_u8(effect + 1);
}

pub fn creature_square(out: &mut PacketWriter, creature: u32, color: u8) {
    out.put_u8(server::CREATURE_SQUARE);
    out.put_u32(creature);
    out.put_u8(color);
}

pub fn creature_health(out: &mut PacketWriter, creature: u32, percent: u8) {
    out.put_u8(server::CREATURE_HEALTH);
    out.put_u32(creature);
    out.put_u8(percent);
}

pub fn creature_light(out: &mut PacketWriter, creature: u32, light: LightInfo) {
    out.put_u8(server::CREATURE_LIGHT);
    out.put_u32(creature);
    out.put_u8(light.level);
    out.put_u8(light.color);
}

pub fn creature_outfit(out: &mut PacketWriter, creature: u32, outfit: &Outfit) {
    out.put_u8(server::CREATURE_OUTFIT);
    out.put_u32(creature);
    put_outfit(out, outfit);
}

pub fn creature_speed(out: &mut PacketWriter, creature: u32, speed: u16) {
    out.put_u8(server::CREATURE_SPEED);
    out.put_u32(creature);
    out.put_u16(speed);
}

pub fn creature_skull(out: &mut PacketWriter, creature: u32, skull: u8) {
    out.put_u8(server::CREATURE_SKULL);
    out.put_u32(creature);
    out.put_u8(skull);
}

pub fn creature_shield(out: &mut PacketWriter, creature: u32, shield: u8) {
    out.put_u8(server::CREATURE_SHIELD);
    out.put_u32(creature);
    out.put_u8(shield);
}

pub fn creature_walkthrough(out: &mut PacketWriter, creature: u32, walkable: bool) {
    out.put_u8(server::CREATURE_WALKTHROUGH);
    out.put_u32(creature);
    out.put_u8(!walkable as u8);
}

// --- player state ---

pub fn player_stats(out: &mut PacketWriter, stats: &PlayerStats) {
    out.put_u8(server::PLAYER_STATS);
    out.put_u16(stats.health);
    out.put_u16(stats.max_health);
    out.put_u32(stats.free_capacity);
    out.put_u32(stats.capacity);
    out.put_u64(stats.experience);
    out.put_u16(stats.level);
    out.put_u8(stats.level_percent);
    out.put_u16(stats.mana);
    out.put_u16(stats.max_mana);
    out.put_u8(stats.magic_level);
    out.put_u8(stats.base_magic_level);
    out.put_u8(stats.magic_level_percent);
    out.put_u8(stats.soul);
    out.put_u16(stats.stamina_minutes);
    out.put_u16(stats.speed);
    out.put_u16(stats.regeneration_secs);
}

pub fn player_skills(out: &mut PacketWriter, skills: &SkillSet) {
    out.put_u8(server::PLAYER_SKILLS);
    for skill in skills {
        out.put_u8(skill.level);
        out.put_u8(skill.base);
        out.put_u8(skill.percent);
    }
}

pub fn player_icons(out: &mut PacketWriter, icons: u16) {
    out.put_u8(server::PLAYER_ICONS);
    out.put_u16(icons);
}

/// One equipment slot; an absent item clears it.
pub fn inventory_slot(out: &mut PacketWriter, slot: u8, item: Option<&ItemView>) {
    match item {
        Some(item) => {
            out.put_u8(server::INVENTORY_SET);
            out.put_u8(slot);
            put_item(out, item);
        }
        None => {
            out.put_u8(server::INVENTORY_CLEAR);
            out.put_u8(slot);
        }
    }
}

pub fn cancel_target(out: &mut PacketWriter) {
    out.put_u8(server::CANCEL_TARGET);
    out.put_u32(0);
}

/// Walk rejection; `direction` snaps the client back to its server-side
/// facing.
pub fn cancel_walk(out: &mut PacketWriter, direction: Direction) {
    out.put_u8(server::CANCEL_WALK);
    out.put_u8(direction.facing_tag());
}

pub fn spell_cooldown(out: &mut PacketWriter, icon: u8, millis: u32) {
    out.put_u8(server::SPELL_COOLDOWN);
    out.put_u8(icon);
    out.put_u32(millis);
}

pub fn spell_group_cooldown(out: &mut PacketWriter, group: u8, millis: u32) {
    out.put_u8(server::SPELL_GROUP_COOLDOWN);
    out.put_u8(group);
    out.put_u32(millis);
}

// --- chat ---

/// Speech as one hearer receives it. The class picks the trailing
/// addressing field; `statement` is the server-wide utterance number players
/// can cite in reports, zero for non-player speakers.
#[allow(clippy::too_many_arguments)]
pub fn creature_speak(
    out: &mut PacketWriter,
    statement: u32,
    name: &str,
    level: u16,
    class: MessageClass,
    channel: u16,
    position: Option<Position>,
    text: &str,
) {
    out.put_u8(server::CREATURE_SPEAK);
    out.put_u32(statement);
    out.put_string(name);
    out.put_u16(level);
    out.put_u8(class.as_byte());
    if class.carries_position() {
        position.unwrap_or(Position::new(0, 0, 0)).write_to(out);
    } else if class.carries_channel() {
        out.put_u16(channel);
    }
    out.put_string(text);
}

pub fn channel_list(out: &mut PacketWriter, channels: &[ChannelInfo]) {
    out.put_u8(server::CHANNEL_LIST);
    out.put_u8(channels.len().min(LIST_BYTE_CAP) as u8);
    for channel in channels.iter().take(LIST_BYTE_CAP) {
        out.put_u16(channel.id);
        out.put_string(&channel.name);
    }
}

/// Channel window with its member and invitee rosters; plain channels carry
/// empty rosters.
pub fn channel_open(
    out: &mut PacketWriter,
    id: u16,
    name: &str,
    members: &[String],
    invitees: &[String],
) {
    out.put_u8(server::CHANNEL_OPEN);
    out.put_u16(id);
    out.put_string(name);
    out.put_u16(members.len().min(usize::from(u16::MAX)) as u16);
    for member in members.iter().take(usize::from(u16::MAX)) {
        out.put_string(member);
    }
    out.put_u16(invitees.len().min(usize::from(u16::MAX)) as u16);
    for invitee in invitees.iter().take(usize::from(u16::MAX)) {
        out.put_string(invitee);
    }
}

/// Open a private conversation window with the named player.
pub fn channel_private(out: &mut PacketWriter, receiver: &str) {
    out.put_u8(server::CHANNEL_PRIVATE);
    out.put_string(receiver);
}

/// Freshly created conversation channel; the owner is its only member.
pub fn channel_create(out: &mut PacketWriter, id: u16, name: &str, owner: &str) {
    out.put_u8(server::CHANNEL_CREATE);
    out.put_u16(id);
    out.put_string(name);
    out.put_u16(0x01);
    out.put_string(owner);
    out.put_u16(0x00);
}

pub fn channel_close(out: &mut PacketWriter, id: u16) {
    out.put_u8(server::CHANNEL_CLOSE);
    out.put_u16(id);
}

pub fn channel_event(out: &mut PacketWriter, channel: u16, name: &str, event: u8) {
    out.put_u8(server::CHANNEL_EVENT);
    out.put_u16(channel);
    out.put_string(name);
    out.put_u8(event);
}

/// Status text. Combat classes prepend the map position and their
/// value/colour pairs; a missing second pair goes out zeroed.
pub fn text_message(
    out: &mut PacketWriter,
    class: MessageClass,
    text: &str,
    position: Option<Position>,
    details: Option<&MessageDetails>,
) {
    out.put_u8(server::TEXT_MESSAGE);
    out.put_u8(class.as_byte());
    if class.carries_damage_pair() {
        let details = details.copied().unwrap_or_default();
        position.unwrap_or(Position::new(0, 0, 0)).write_to(out);
        out.put_u32(details.value);
        out.put_u8(details.color);
        let (sub_value, sub_color) = details.sub.unwrap_or((0, 0));
        out.put_u32(sub_value);
        out.put_u8(sub_color);
    } else if class.carries_single_value() {
        let details = details.copied().unwrap_or_default();
        position.unwrap_or(Position::new(0, 0, 0)).write_to(out);
        out.put_u32(details.value);
        out.put_u8(details.color);
    }
    out.put_string(text);
}

// --- containers, shop, trade ---

pub fn container_open(out: &mut PacketWriter, container_id: u8, view: &ContainerView) {
    out.put_u8(server::CONTAINER_OPEN);
    out.put_u8(container_id);
    put_item(out, &view.item);
    out.put_string(&view.name);
    out.put_u8(view.capacity);
    out.put_u8(view.has_parent as u8);
    out.put_u8(view.items.len().min(LIST_BYTE_CAP) as u8);
    for item in view.items.iter().take(LIST_BYTE_CAP) {
        put_item(out, item);
    }
}

pub fn container_close(out: &mut PacketWriter, container_id: u8) {
    out.put_u8(server::CONTAINER_CLOSE);
    out.put_u8(container_id);
}

pub fn container_add(out: &mut PacketWriter, container_id: u8, item: &ItemView) {
    out.put_u8(server::CONTAINER_ADD);
    out.put_u8(container_id);
    put_item(out, item);
}

pub fn container_update(out: &mut PacketWriter, container_id: u8, slot: u8, item: &ItemView) {
    out.put_u8(server::CONTAINER_UPDATE);
    out.put_u8(container_id);
    out.put_u8(slot);
    put_item(out, item);
}

pub fn container_remove(out: &mut PacketWriter, container_id: u8, slot: u8) {
    out.put_u8(server::CONTAINER_REMOVE);
    out.put_u8(container_id);
    out.put_u8(slot);
}

pub fn shop_open(out: &mut PacketWriter, trader: &str, stock: &[ShopEntry]) {
    out.put_u8(server::SHOP_OPEN);
    out.put_string(trader);
    out.put_u8(stock.len().min(LIST_BYTE_CAP) as u8);
    for entry in stock.iter().take(LIST_BYTE_CAP) {
        out.put_u16(entry.client_id);
        out.put_u8(entry.count_byte);
        out.put_string(&entry.name);
        out.put_u32(entry.weight);
        out.put_u32(entry.buy_price);
        out.put_u32(entry.sell_price);
    }
}

pub fn shop_close(out: &mut PacketWriter) {
    out.put_u8(server::SHOP_CLOSE);
}

/// Player money plus what the open trader would buy back.
pub fn shop_goods(out: &mut PacketWriter, money: u32, goods: &[GoodsEntry]) {
    out.put_u8(server::SHOP_GOODS);
    out.put_u32(money);
    out.put_u8(goods.len().min(LIST_BYTE_CAP) as u8);
    for entry in goods.iter().take(LIST_BYTE_CAP) {
        out.put_u16(entry.client_id);
        out.put_u8(entry.count);
    }
}

/// One side of a trade window; `items` arrives flattened, containers before
/// their contents.
pub fn trade_offer(
    out: &mut PacketWriter,
    counter_offer: bool,
    partner: &str,
    items: &[ItemView],
) {
    out.put_u8(if counter_offer {
        server::TRADE_COUNTER_OFFER
    } else {
        server::TRADE_OWN_OFFER
    });
    out.put_string(partner);
    out.put_u8(items.len().min(LIST_BYTE_CAP) as u8);
    for item in items.iter().take(LIST_BYTE_CAP) {
        put_item(out, item);
    }
}

pub fn trade_close(out: &mut PacketWriter) {
    out.put_u8(server::TRADE_CLOSE);
}

// --- windows and lists ---

/// Read-or-write text window over an item. A writable window announces its
/// capacity in the length word; a read-only one echoes the text length.
pub fn text_window(
    out: &mut PacketWriter,
    window: u32,
    item: &ItemView,
    text: &str,
    writable_to: Option<u16>,
    writer: &str,
    date: &str,
) {
    out.put_u8(server::TEXT_WINDOW);
    out.put_u32(window);
    out.put_u16(item.client_id);
    match writable_to {
        Some(max_len) => out.put_u16(max_len),
        None => out.put_u16(text.len().min(usize::from(u16::MAX)) as u16),
    }
    out.put_string(text);
    out.put_string(writer);
    out.put_string(date);
}

pub fn house_window(out: &mut PacketWriter, window: u32, text: &str) {
    out.put_u8(server::HOUSE_WINDOW);
    out.put_u8(0x00);
    out.put_u32(window);
    out.put_string(text);
}

/// Outfit-selection dialog. An empty wardrobe still shows one line so the
/// client has something to render.
pub fn outfit_window(
    out: &mut PacketWriter,
    current: &Outfit,
    choices: &[OutfitChoice],
    mounts: Option<&[MountChoice]>,
) {
    out.put_u8(server::OUTFIT_WINDOW);
    put_outfit(out, current);

    if choices.is_empty() {
        out.put_u8(1);
        out.put_u16(current.look_type);
        out.put_string("Your outfit");
        out.put_u8(current.addons);
    } else {
        out.put_u8(choices.len().min(LIST_BYTE_CAP) as u8);
        for choice in choices.iter().take(LIST_BYTE_CAP) {
            out.put_u16(choice.look_type);
            out.put_string(&choice.name);
            out.put_u8(choice.addons);
        }
    }

    match mounts {
        Some(mounts) => {
            out.put_u8(mounts.len().min(LIST_BYTE_CAP) as u8);
            for mount in mounts.iter().take(LIST_BYTE_CAP) {
                out.put_u16(mount.client_id);
                out.put_string(&mount.name);
            }
        }
        None => out.put_u8(0),
    }
}

pub fn vip_entry(out: &mut PacketWriter, character: u32, name: &str, online: bool) {
    out.put_u8(server::VIP_ENTRY);
    out.put_u32(character);
    out.put_string(name);
    out.put_u8(online as u8);
}

pub fn vip_online(out: &mut PacketWriter, character: u32) {
    out.put_u8(server::VIP_ONLINE);
    out.put_u32(character);
}

pub fn vip_offline(out: &mut PacketWriter, character: u32) {
    out.put_u8(server::VIP_OFFLINE);
    out.put_u32(character);
}

pub fn tutorial(out: &mut PacketWriter, hint: u8) {
    out.put_u8(server::TUTORIAL);
    out.put_u8(hint);
}

pub fn map_marker(out: &mut PacketWriter, pos: Position, kind: u8, description: &str) {
    out.put_u8(server::MAP_MARKER);
    pos.write_to(out);
    out.put_u8(kind);
    out.put_string(description);
}

pub fn quest_log(out: &mut PacketWriter, quests: &[QuestLine]) {
    out.put_u8(server::QUEST_LOG);
    out.put_u16(quests.len().min(usize::from(u16::MAX)) as u16);
    for quest in quests.iter().take(usize::from(u16::MAX)) {
        out.put_u16(quest.id);
        out.put_string(&quest.name);
        out.put_u8(quest.completed as u8);
    }
}

pub fn quest_info(out: &mut PacketWriter, quest: u16, missions: &[QuestMission]) {
    out.put_u8(server::QUEST_INFO);
    out.put_u16(quest);
    out.put_u8(missions.len().min(LIST_BYTE_CAP) as u8);
    for mission in missions.iter().take(LIST_BYTE_CAP) {
        out.put_string(&mission.name);
        out.put_string(&mission.description);
    }
}
