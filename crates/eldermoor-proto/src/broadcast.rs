//! Fan-out of simulation effects to every session allowed to see them, the
//! login snapshot, and speech delivery.
//!
//! The simulation reports what changed; this side decides who is told.
//! Directed effects go to one player's session, map effects run the
//! observer loop with per-observer visibility gates, speech carries its
//! audience with it.

use eldermoor_wire::MessageClass;
use eldermoor_world::snapshot::{EQUIPMENT_SLOT_FIRST, EQUIPMENT_SLOT_LAST, creature_kind};
use eldermoor_world::{CharacterId, PlayerCommand, Position, WorldEffect, WorldView};
use tracing::debug;

use crate::engine::GameEngine;
use crate::known::KnownCreatures;
use crate::map_view::ViewEncoder;
use crate::outbound;
use crate::session::{SessionId, SessionState};

impl GameEngine {
    // --- login snapshot ---

    /// Everything a freshly bound client needs on screen: the self record,
    /// the map, equipment, status bars, light, icons, and the VIP list.
    pub(crate) fn welcome(&mut self, id: SessionId) {
        let (creature, can_report_bugs, account) = match self.sessions.get(&id) {
            Some(session) => {
                let Some(creature) = session.creature else {
                    return;
                };
                let bugs = session
                    .record
                    .as_ref()
                    .is_some_and(|r| r.privileges.can_report_bugs);
                (creature, bugs, session.account)
            }
            None => return,
        };
        let Some(position) = self.world.creature_position(creature) else {
            debug!(session = %id, creature, "welcome without a placed creature");
            return;
        };

        let vips: Vec<(u32, String, bool)> = account
            .map(|account| self.directory.vip_list(account))
            .unwrap_or_default()
            .into_iter()
            .map(|entry| {
                let online = self.world.is_character_online(entry.id);
                (entry.id.0, entry.name, online)
            })
            .collect();

        let world: &dyn WorldView = &*self.world;
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        // A replacing client starts with an empty creature cache.
        session.known = KnownCreatures::new();

        outbound::login_success(&mut session.writer, creature, can_report_bugs);
        let mut enc = ViewEncoder::new(world, &mut session.known, creature);
        enc.full_map(&mut session.writer, position);
        for slot in EQUIPMENT_SLOT_FIRST..=EQUIPMENT_SLOT_LAST {
            let item = world.equipment_item(creature, slot);
            outbound::inventory_slot(&mut session.writer, slot, item.as_ref());
        }
        if let Some(stats) = world.player_stats(creature) {
            outbound::player_stats(&mut session.writer, &stats);
        }
        if let Some(skills) = world.player_skills(creature) {
            outbound::player_skills(&mut session.writer, &skills);
        }
        outbound::world_light(&mut session.writer, world.world_light());
        if let Some(view) = world.creature(creature) {
            outbound::creature_light(&mut session.writer, creature, view.light);
        }
        outbound::player_icons(&mut session.writer, world.player_icons(creature));
        for (vip, name, online) in vips {
            outbound::vip_entry(&mut session.writer, vip, &name, online);
        }
    }

    /// Tell every playing session watching `character` that it came or went.
    pub(crate) fn notify_vip_watchers(&mut self, character: CharacterId, online: bool) {
        let watchers: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|session| session.playing())
            .filter_map(|session| {
                let account = session.account?;
                self.directory
                    .vip_list(account)
                    .iter()
                    .any(|entry| entry.id == character)
                    .then_some(session.id)
            })
            .collect();
        for sid in watchers {
            if let Some(session) = self.sessions.get_mut(&sid) {
                if online {
                    outbound::vip_online(&mut session.writer, character.0);
                } else {
                    outbound::vip_offline(&mut session.writer, character.0);
                }
            }
        }
    }

    // --- effect fan-out ---

    /// Encode a batch of simulation effects into every session that may see
    /// them.
    pub(crate) fn fan_out(&mut self, effects: &[WorldEffect]) {
        if effects.is_empty() {
            return;
        }
        let observers: Vec<(u32, SessionId)> = self
            .by_creature
            .iter()
            .map(|(&creature, &session)| (creature, session))
            .collect();
        for effect in effects {
            match effect.addressee() {
                Some(player) => self.deliver(player, effect),
                None => self.spread(&observers, effect),
            }
        }
    }

    /// An effect addressed to one player.
    fn deliver(&mut self, player: u32, effect: &WorldEffect) {
        let Some(&sid) = self.by_creature.get(&player) else {
            return;
        };
        let world: &dyn WorldView = &*self.world;
        let Some(session) = self.sessions.get_mut(&sid) else {
            return;
        };
        let out = &mut session.writer;
        match effect {
            WorldEffect::SquareMarked {
                creature, color, ..
            } => outbound::creature_square(out, *creature, *color),
            WorldEffect::StatsChanged { .. } => {
                if let Some(stats) = world.player_stats(player) {
                    outbound::player_stats(out, &stats);
                }
            }
            WorldEffect::SkillsChanged { .. } => {
                if let Some(skills) = world.player_skills(player) {
                    outbound::player_skills(out, &skills);
                }
            }
            WorldEffect::InventoryChanged { slot, .. } => {
                let item = world.equipment_item(player, *slot);
                outbound::inventory_slot(out, *slot, item.as_ref());
            }
            WorldEffect::IconsChanged { .. } => {
                outbound::player_icons(out, world.player_icons(player));
            }
            WorldEffect::WalkCancelled { direction, .. } => outbound::cancel_walk(out, *direction),
            WorldEffect::TargetCancelled { .. } => outbound::cancel_target(out),
            WorldEffect::TextFor {
                class,
                text,
                position,
                details,
                ..
            } => outbound::text_message(out, *class, text, *position, details.as_ref()),
            WorldEffect::FyiFor { text, .. } => outbound::fyi_box(out, text),
            WorldEffect::ReloginPrompted {
                pvp_frame_percent, ..
            } => outbound::relogin_window(out, *pvp_frame_percent),
            WorldEffect::CooldownStarted { icon, millis, .. } => {
                outbound::spell_cooldown(out, *icon, *millis);
            }
            WorldEffect::CooldownGroupStarted { group, millis, .. } => {
                outbound::spell_group_cooldown(out, *group, *millis);
            }
            WorldEffect::TutorialShown { hint, .. } => outbound::tutorial(out, *hint),
            WorldEffect::MapMarkerAdded {
                position,
                kind,
                description,
                ..
            } => outbound::map_marker(out, *position, *kind, description),
            WorldEffect::ContainerOpened {
                container, view, ..
            } => outbound::container_open(out, *container, view),
            WorldEffect::ContainerClosed { container, .. } => {
                outbound::container_close(out, *container);
            }
            WorldEffect::ContainerItemAdded {
                container, item, ..
            } => outbound::container_add(out, *container, item),
            WorldEffect::ContainerItemUpdated {
                container,
                slot,
                item,
                ..
            } => outbound::container_update(out, *container, *slot, item),
            WorldEffect::ContainerItemRemoved {
                container, slot, ..
            } => outbound::container_remove(out, *container, *slot),
            WorldEffect::ShopOpened { trader, stock, .. } => {
                outbound::shop_open(out, trader, stock);
            }
            WorldEffect::ShopClosed { .. } => outbound::shop_close(out),
            WorldEffect::GoodsUpdated { money, goods, .. } => {
                outbound::shop_goods(out, *money, goods);
            }
            WorldEffect::TradeItemsShown {
                partner,
                counter_offer,
                items,
                ..
            } => outbound::trade_offer(out, *counter_offer, partner, items),
            WorldEffect::TradeClosed { .. } => outbound::trade_close(out),
            WorldEffect::TextWindowShown {
                window,
                item,
                text,
                writable_to,
                writer,
                date,
                ..
            } => outbound::text_window(out, *window, item, text, *writable_to, writer, date),
            WorldEffect::HouseWindowShown { window, text, .. } => {
                outbound::house_window(out, *window, text);
            }
            // Broadcast variants never reach here; addressee() routed them.
            _ => {}
        }
    }

    /// A map effect, gated per observer.
    fn spread(&mut self, observers: &[(u32, SessionId)], effect: &WorldEffect) {
        if let WorldEffect::Speech {
            speaker,
            name,
            level,
            class,
            channel,
            text,
            position,
            hearers,
        } = effect
        {
            let statement = self.next_statement(*speaker);
            self.deliver_speech(
                hearers, statement, name, *level, *class, *channel, *position, text,
            );
            return;
        }

        // A creature record encoded for one observer is the same for all;
        // fetch it once.
        let subject = match effect {
            WorldEffect::CreatureAppeared { creature, .. }
            | WorldEffect::CreatureMoved { creature, .. } => self.world.creature(*creature),
            _ => None,
        };

        let world: &dyn WorldView = &*self.world;
        for &(observer, sid) in observers {
            let Some(session) = self.sessions.get_mut(&sid) else {
                continue;
            };
            if session.state != SessionState::Playing {
                continue;
            }
            let mut enc = ViewEncoder::new(world, &mut session.known, observer);
            let out = &mut session.writer;
            match effect {
                WorldEffect::CreatureAppeared {
                    creature,
                    position,
                    stack,
                } => {
                    let Some(view) = subject.as_ref() else {
                        continue;
                    };
                    if *creature != observer
                        && world.can_observe(observer, *creature)
                        && enc.sees(*position)
                    {
                        enc.tile_creature(out, *position, *stack, view);
                    }
                }
                WorldEffect::CreatureVanished {
                    creature,
                    position,
                    stack,
                } => {
                    if *creature != observer
                        && world.can_observe(observer, *creature)
                        && enc.sees(*position)
                    {
                        outbound::remove_tile_thing(out, *position, *stack);
                    }
                }
                WorldEffect::CreatureMoved {
                    creature,
                    from,
                    from_stack,
                    to,
                    to_stack,
                    teleported,
                } => {
                    if *creature == observer {
                        enc.own_moved(out, *from, *from_stack, *to, *teleported);
                    } else if let Some(view) = subject.as_ref() {
                        enc.creature_moved(
                            out,
                            view,
                            *from,
                            *from_stack,
                            *to,
                            *to_stack,
                            *teleported,
                        );
                    }
                }
                WorldEffect::CreatureTurned {
                    creature,
                    position,
                    stack,
                    direction,
                } => {
                    if world.can_observe(observer, *creature) && enc.sees(*position) {
                        outbound::creature_turn(out, *position, *stack, *creature, *direction);
                    }
                }
                WorldEffect::WorldLightChanged(light) => outbound::world_light(out, *light),
                WorldEffect::MagicEffect { position, effect } => {
                    if enc.sees(*position) {
                        outbound::magic_effect(out, *position, *effect);
                    }
                }
                WorldEffect::DistanceEffect { from, to, effect } => {
                    if enc.sees(*from) || enc.sees(*to) {
                        outbound::distance_shot(out, *from, *to, *effect);
                    }
                }
                WorldEffect::TileItemAdded {
                    position,
                    stack,
                    item,
                } => {
                    if enc.sees(*position) {
                        outbound::tile_item_added(out, *position, *stack, item);
                    }
                }
                WorldEffect::TileItemUpdated {
                    position,
                    stack,
                    item,
                } => {
                    if enc.sees(*position) {
                        outbound::tile_item_updated(out, *position, *stack, item);
                    }
                }
                WorldEffect::TileItemRemoved { position, stack } => {
                    if enc.sees(*position) {
                        outbound::remove_tile_thing(out, *position, *stack);
                    }
                }
                WorldEffect::TileRefreshed { position } => {
                    if enc.sees(*position) {
                        enc.update_tile(out, *position);
                    }
                }
                WorldEffect::HealthChanged { creature, percent } => {
                    if watches(world, &enc, observer, *creature) {
                        outbound::creature_health(out, *creature, *percent);
                    }
                }
                WorldEffect::CreatureLightChanged { creature, light } => {
                    if watches(world, &enc, observer, *creature) {
                        outbound::creature_light(out, *creature, *light);
                    }
                }
                WorldEffect::OutfitChanged { creature, outfit } => {
                    if watches(world, &enc, observer, *creature) {
                        outbound::creature_outfit(out, *creature, outfit);
                    }
                }
                WorldEffect::SpeedChanged { creature, speed } => {
                    if watches(world, &enc, observer, *creature) {
                        outbound::creature_speed(out, *creature, *speed);
                    }
                }
                WorldEffect::SkullChanged { creature, skull } => {
                    if watches(world, &enc, observer, *creature) {
                        outbound::creature_skull(out, *creature, *skull);
                    }
                }
                WorldEffect::PartyShieldChanged { creature, shield } => {
                    if watches(world, &enc, observer, *creature) {
                        outbound::creature_shield(out, *creature, *shield);
                    }
                }
                WorldEffect::WalkthroughChanged { creature, walkable } => {
                    if watches(world, &enc, observer, *creature) {
                        outbound::creature_walkthrough(out, *creature, *walkable);
                    }
                }
                // Addressed variants never reach here.
                _ => {}
            }
        }
    }

    // --- speech ---

    /// Route player talk. Channel, private, and broadcast classes are served
    /// here; map-carried talk goes back to the simulation, which decides who
    /// hears it.
    pub(crate) fn route_say(
        &mut self,
        id: SessionId,
        creature: u32,
        class: MessageClass,
        channel: u16,
        receiver: String,
        text: String,
    ) -> Option<PlayerCommand> {
        if class.carries_channel() {
            self.say_to_channel(creature, class, channel, &text);
            return None;
        }
        match class {
            MessageClass::PrivateTo | MessageClass::GamemasterPrivateTo => {
                self.say_private(id, creature, class, &receiver, &text);
                None
            }
            MessageClass::GamemasterBroadcast => {
                self.say_broadcast(id, creature, &text);
                None
            }
            _ => Some(PlayerCommand::Say {
                class,
                channel,
                receiver,
                text,
            }),
        }
    }

    fn say_to_channel(&mut self, creature: u32, class: MessageClass, channel: u16, text: &str) {
        let Some(members) = self.chat.channel_members(channel, CharacterId(creature)) else {
            debug!(creature, channel, "talk into a channel the speaker is not in");
            return;
        };
        let Some(view) = self.world.creature(creature) else {
            return;
        };
        let statement = self.next_statement(creature);
        for member in members {
            if let Some(&sid) = self.by_creature.get(&member.0) {
                if let Some(session) = self.sessions.get_mut(&sid) {
                    outbound::creature_speak(
                        &mut session.writer,
                        statement,
                        &view.name,
                        view.level,
                        class,
                        channel,
                        None,
                        text,
                    );
                }
            }
        }
    }

    fn say_private(
        &mut self,
        id: SessionId,
        creature: u32,
        class: MessageClass,
        receiver: &str,
        text: &str,
    ) {
        let Some(view) = self.world.creature(creature) else {
            return;
        };
        let sender_gm = self
            .sessions
            .get(&id)
            .and_then(|s| s.record.as_ref())
            .is_some_and(|r| r.privileges.gamemaster);
        let target = self.sessions.values().find_map(|session| {
            let record = session.record.as_ref()?;
            (session.playing() && record.name.eq_ignore_ascii_case(receiver))
                .then(|| (session.id, record.name.clone()))
        });
        match target {
            Some((target_id, name)) => {
                // The staff-red class needs the privilege; everyone else's
                // mail arrives as a plain private message.
                let delivered = if class == MessageClass::GamemasterPrivateTo && sender_gm {
                    MessageClass::GamemasterPrivateFrom
                } else {
                    MessageClass::PrivateFrom
                };
                let statement = self.next_statement(creature);
                if let Some(session) = self.sessions.get_mut(&target_id) {
                    outbound::creature_speak(
                        &mut session.writer,
                        statement,
                        &view.name,
                        view.level,
                        delivered,
                        0,
                        None,
                        text,
                    );
                }
                self.tell(
                    id,
                    MessageClass::StatusSmall,
                    &format!("Message sent to {name}."),
                );
            }
            None => {
                self.tell(
                    id,
                    MessageClass::StatusSmall,
                    "A player with this name is not online.",
                );
            }
        }
    }

    fn say_broadcast(&mut self, id: SessionId, creature: u32, text: &str) {
        let gamemaster = self
            .sessions
            .get(&id)
            .and_then(|s| s.record.as_ref())
            .is_some_and(|r| r.privileges.gamemaster);
        if !gamemaster {
            debug!(creature, "broadcast from a non-gamemaster dropped");
            return;
        }
        let Some(view) = self.world.creature(creature) else {
            return;
        };
        let statement = self.next_statement(creature);
        let targets: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|session| session.playing())
            .map(|session| session.id)
            .collect();
        for sid in targets {
            if let Some(session) = self.sessions.get_mut(&sid) {
                outbound::creature_speak(
                    &mut session.writer,
                    statement,
                    &view.name,
                    view.level,
                    MessageClass::GamemasterBroadcast,
                    0,
                    None,
                    text,
                );
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn deliver_speech(
        &mut self,
        hearers: &[u32],
        statement: u32,
        name: &str,
        level: u16,
        class: MessageClass,
        channel: u16,
        position: Option<Position>,
        text: &str,
    ) {
        for &hearer in hearers {
            let Some(&sid) = self.by_creature.get(&hearer) else {
                continue;
            };
            let Some(session) = self.sessions.get_mut(&sid) else {
                continue;
            };
            outbound::creature_speak(
                &mut session.writer,
                statement,
                name,
                level,
                class,
                channel,
                position,
                text,
            );
        }
    }

    /// Statement ids stamp player speech for abuse reports; other speakers
    /// get zero.
    pub(crate) fn next_statement(&mut self, speaker: u32) -> u32 {
        let player = self
            .world
            .creature(speaker)
            .is_some_and(|view| view.kind == creature_kind::PLAYER);
        if player {
            self.statements += 1;
            self.statements
        } else {
            0
        }
    }
}

/// Whether `observer` both may perceive `creature` and has it on screen.
fn watches(world: &dyn WorldView, enc: &ViewEncoder<'_>, observer: u32, creature: u32) -> bool {
    world.can_observe(observer, creature)
        && world
            .creature_position(creature)
            .is_some_and(|pos| enc.sees(pos))
}
