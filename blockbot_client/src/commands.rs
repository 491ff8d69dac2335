// Chat command surface.
//
// Players steer the bot by chatting. The server relays chat as
// `<user> text`; the first word of `text` names the command:
//
//   come                      walk to the speaker
//   goto <place>              walk to a marked place
//   mark <place>              remember where the bot stands
//   dig <x> <y> <z>           dig one block
//   build <x> <y> <z> <kind>  place one block
//   say <text>                repeat something in chat
//   tp <player>               ask the server to teleport us
//   stop                      drop every queued action
//
// Commands queue actions at the back, so several can be issued in a row.
// Lines the bot itself said are ignored, which keeps `say` from echoing
// into a loop. Unknown words are not an error; the line is just chat.

use blockbot_agent::{Action, BlockPos, Bot, NavMode};
use tracing::{debug, warn};

use crate::services::LocationStore;

/// Where a command line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandSource {
    /// A player's chat line relayed by the server.
    Chat,
    /// Typed on the bot's own console.
    Console,
}

pub trait CommandRouter {
    /// Handle one line. Returns whether it was a command.
    fn dispatch(&mut self, source: CommandSource, user: &str, text: &str, bot: &mut Bot) -> bool;
}

/// Split a relayed chat line into (speaker, text).
pub fn parse_chat_line(line: &str) -> Option<(&str, &str)> {
    let (user, text) = line.strip_prefix('<')?.split_once('>')?;
    if user.is_empty() {
        return None;
    }
    Some((user, text.trim()))
}

fn reply(bot: &mut Bot, text: &str) {
    if let Err(e) = bot.outbound().chat(text) {
        warn!(error = %e, "failed to send chat reply");
    }
}

fn parse_pos(args: &[&str]) -> Option<BlockPos> {
    match args {
        [x, y, z, ..] => Some(BlockPos::new(x.parse().ok()?, y.parse().ok()?, z.parse().ok()?)),
        _ => None,
    }
}

pub struct BuiltinCommands {
    store: Box<dyn LocationStore>,
}

impl BuiltinCommands {
    pub fn new(store: impl LocationStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }
}

impl CommandRouter for BuiltinCommands {
    fn dispatch(&mut self, source: CommandSource, user: &str, text: &str, bot: &mut Bot) -> bool {
        if user == bot.identity().username {
            return false;
        }
        let mut words = text.split_whitespace();
        let Some(command) = words.next() else {
            return false;
        };
        let args: Vec<&str> = words.collect();

        match command {
            "come" => match bot.entities.by_name(user).map(|e| e.position.to_cell()) {
                Some(cell) => bot.enqueue_back(Action::navigate(cell, NavMode::Exact)),
                None => reply(bot, "I don't know where you are"),
            },
            "goto" => match args.first().and_then(|place| self.store.load(place)) {
                Some(pos) => bot.enqueue_back(Action::navigate(pos, NavMode::Exact)),
                None => reply(bot, "I don't know that place"),
            },
            "mark" => match args.first() {
                Some(place) => {
                    let here = bot.pose.position.to_cell();
                    match self.store.save(place, here) {
                        Ok(()) => reply(bot, &format!("Marked {place} at {here}")),
                        Err(e) => {
                            warn!(place, error = %e, "could not save location");
                            reply(bot, "I couldn't remember that");
                        }
                    }
                }
                None => reply(bot, "usage: mark <place>"),
            },
            "dig" => match parse_pos(&args) {
                Some(pos) => bot.enqueue_back(Action::dig(pos)),
                None => reply(bot, "usage: dig <x> <y> <z>"),
            },
            "build" => match (parse_pos(&args), args.get(3).and_then(|k| k.parse::<u8>().ok())) {
                (Some(pos), Some(kind)) => bot.enqueue_back(Action::build(pos, kind)),
                _ => reply(bot, "usage: build <x> <y> <z> <kind>"),
            },
            "say" => {
                let rest = args.join(" ");
                if !rest.is_empty() {
                    bot.enqueue_back(Action::say(rest));
                }
            }
            "tp" => match args.first() {
                Some(target) => bot.enqueue_back(Action::teleport(*target)),
                None => reply(bot, "usage: tp <player>"),
            },
            "stop" => bot.clear(),
            _ => return false,
        }
        debug!(?source, user, command, queued = bot.len(), "command accepted");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryLocationStore;
    use crate::testkit::{FrameLog, chat_lines};
    use blockbot_agent::{AgentConfig, Vector};

    fn setup() -> (Bot, FrameLog, BuiltinCommands) {
        let log = FrameLog::default();
        let bot = Bot::new("bot", AgentConfig::default(), log.clone());
        (bot, log, BuiltinCommands::new(MemoryLocationStore::new()))
    }

    #[test]
    fn chat_line_parsing() {
        assert_eq!(parse_chat_line("<alice> dig 1 2 3"), Some(("alice", "dig 1 2 3")));
        assert_eq!(parse_chat_line("<bob>   come "), Some(("bob", "come")));
        assert_eq!(parse_chat_line("alice joined the game"), None);
        assert_eq!(parse_chat_line("<> hi"), None);
    }

    #[test]
    fn dig_and_build_queue_actions() {
        let (mut bot, _, mut router) = setup();
        assert!(router.dispatch(CommandSource::Chat, "alice", "dig 1 -2 3", &mut bot));
        assert!(router.dispatch(CommandSource::Chat, "alice", "build 4 5 6 4", &mut bot));
        assert_eq!(bot.queued().collect::<Vec<_>>(), vec!["dig", "build"]);
    }

    #[test]
    fn malformed_arguments_get_usage() {
        let (mut bot, log, mut router) = setup();
        assert!(router.dispatch(CommandSource::Chat, "alice", "dig 1 two 3", &mut bot));
        assert!(bot.is_empty());
        assert_eq!(chat_lines(&log), vec!["usage: dig <x> <y> <z>"]);
    }

    #[test]
    fn come_without_a_known_speaker() {
        let (mut bot, log, mut router) = setup();
        assert!(router.dispatch(CommandSource::Chat, "ghost", "come", &mut bot));
        assert!(bot.is_empty());
        assert_eq!(chat_lines(&log), vec!["I don't know where you are"]);
    }

    #[test]
    fn come_walks_to_the_speaker() {
        let (mut bot, _, mut router) = setup();
        bot.entities
            .spawn_named(9, "alice", 32 * 5, 32 * 64, 32 * 7, 0, 0, 0);
        assert!(router.dispatch(CommandSource::Chat, "alice", "come", &mut bot));
        assert_eq!(bot.queued().collect::<Vec<_>>(), vec!["navigate"]);
    }

    #[test]
    fn mark_then_goto() {
        let (mut bot, log, mut router) = setup();
        assert!(router.dispatch(CommandSource::Chat, "alice", "goto home", &mut bot));
        assert_eq!(chat_lines(&log), vec!["I don't know that place"]);

        bot.pose.position = Vector::new(3.5, 64.0, -2.5);
        assert!(router.dispatch(CommandSource::Chat, "alice", "mark home", &mut bot));
        assert!(router.dispatch(CommandSource::Chat, "alice", "goto home", &mut bot));
        assert_eq!(bot.queued().collect::<Vec<_>>(), vec!["navigate"]);
        assert_eq!(chat_lines(&log)[1], "Marked home at (3, 64, -3)");
    }

    #[test]
    fn say_tp_and_stop() {
        let (mut bot, _, mut router) = setup();
        assert!(router.dispatch(CommandSource::Chat, "alice", "say hello  there", &mut bot));
        assert!(router.dispatch(CommandSource::Chat, "alice", "tp alice", &mut bot));
        assert_eq!(bot.len(), 2);
        assert!(router.dispatch(CommandSource::Console, "alice", "stop", &mut bot));
        assert!(bot.is_empty());
    }

    #[test]
    fn own_lines_and_plain_chat_are_ignored() {
        let (mut bot, log, mut router) = setup();
        assert!(!router.dispatch(CommandSource::Chat, "bot", "dig 1 2 3", &mut bot));
        assert!(!router.dispatch(CommandSource::Chat, "alice", "nice weather", &mut bot));
        assert!(!router.dispatch(CommandSource::Chat, "alice", "", &mut bot));
        assert!(bot.is_empty());
        assert!(chat_lines(&log).is_empty());
    }
}
