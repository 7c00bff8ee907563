//! 内置片段池

use super::{IntentCategory, Mood, TimeOfDay};
use crate::domain::audio::PresentationMode;

/// 内置片段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub text: &'static str,
    pub mood: Mood,
}

const fn f(text: &'static str, mood: Mood) -> Fragment {
    Fragment { text, mood }
}

use Mood::{Contemplative, Creative, Mysterious, Philosophical, Technical};

pub const UNIVERSAL: &[Fragment] = &[
    f("every visit leaves a trace", Contemplative),
    f("the quiet between clicks", Mysterious),
    f("somebody was here before you", Mysterious),
    f("nothing here is finished", Philosophical),
    f("listen closer", Mysterious),
    f("the room remembers", Contemplative),
    f("what brought you here?", Philosophical),
    f("half of this was an accident", Creative),
];

pub const ARCHITECT: &[Fragment] = &[
    f("systems are just promises kept", Technical),
    f("structure is a kind of kindness", Philosophical),
    f("measure twice, deploy once", Technical),
    f("every interface is a boundary", Technical),
    f("load-bearing ideas only", Creative),
    f("the diagram is not the building", Philosophical),
];

pub const AUTHOR: &[Fragment] = &[
    f("every line is a door", Creative),
    f("the draft knows more than you do", Contemplative),
    f("stories hide in the margins", Mysterious),
    f("write it badly, then write it true", Creative),
    f("a sentence is a small house", Philosophical),
    f("the ending was the first thing written", Mysterious),
];

pub const LAB: &[Fragment] = &[
    f("this might break, that's the point", Creative),
    f("hypothesis: you'll click that", Technical),
    f("failed experiments are still data", Technical),
    f("curiosity compiles", Creative),
    f("try the strange version first", Creative),
    f("the prototype is telling you something", Contemplative),
];

const DAWN: &[Fragment] = &[
    f("early light, unwritten pages", Contemplative),
    f("the first idea of the day is rarely the last", Philosophical),
    f("coffee and first principles", Technical),
];

const MORNING: &[Fragment] = &[
    f("the day is still negotiable", Philosophical),
    f("fresh eyes find old bugs", Technical),
    f("momentum starts small", Contemplative),
];

const AFTERNOON: &[Fragment] = &[
    f("the long middle of things", Contemplative),
    f("shadows are getting interesting", Mysterious),
    f("keep building, the light holds", Creative),
];

const DUSK: &[Fragment] = &[
    f("colors change at the edges", Mysterious),
    f("what did today teach you?", Philosophical),
    f("the work softens toward evening", Contemplative),
];

const NIGHT: &[Fragment] = &[
    f("the best ideas keep late hours", Creative),
    f("the screen glows, the house sleeps", Contemplative),
    f("night makes everything a little louder", Mysterious),
];

const WITCHING: &[Fragment] = &[
    f("you shouldn't be awake, neither should I", Mysterious),
    f("at this hour, everything is a draft", Philosophical),
    f("the machines are dreaming too", Mysterious),
];

pub fn time_of_day(time: TimeOfDay) -> &'static [Fragment] {
    match time {
        TimeOfDay::Dawn => DAWN,
        TimeOfDay::Morning => MORNING,
        TimeOfDay::Afternoon => AFTERNOON,
        TimeOfDay::Dusk => DUSK,
        TimeOfDay::Night => NIGHT,
        TimeOfDay::Witching => WITCHING,
    }
}

pub fn mode(mode: PresentationMode) -> &'static [Fragment] {
    match mode {
        PresentationMode::Architect => ARCHITECT,
        PresentationMode::Author => AUTHOR,
        PresentationMode::Lab => LAB,
    }
}

const HIRE: &[Fragment] = &[
    f("good collaborations start with questions", Philosophical),
    f("the right team feels like a rhythm", Contemplative),
    f("show me the problem, not the title", Technical),
];

const BUILD: &[Fragment] = &[
    f("start with the smallest thing that works", Technical),
    f("every tool was once a sketch", Creative),
    f("build it so someone else can fix it", Technical),
];

pub const STORY: &[Fragment] = &[
    f("your story is already underway", Creative),
    f("tell it the way only you can", Creative),
    f("the middle of a story is where it lives", Contemplative),
    f("some stories need a listener first", Philosophical),
];

const PROCESS: &[Fragment] = &[
    f("the process is the product, slowly", Philosophical),
    f("notes, drafts, deletions, repeat", Technical),
    f("method is just patience written down", Contemplative),
];

const EXPLORE: &[Fragment] = &[
    f("wander, the map is incomplete anyway", Mysterious),
    f("there's a room you haven't found yet", Mysterious),
    f("curiosity is a direction", Creative),
];

const LEARN: &[Fragment] = &[
    f("understanding arrives sideways", Philosophical),
    f("ask the naive question", Contemplative),
    f("every expert was lost here once", Philosophical),
];

pub fn intent(category: IntentCategory) -> &'static [Fragment] {
    match category {
        IntentCategory::Hire => HIRE,
        IntentCategory::Build => BUILD,
        IntentCategory::Story => STORY,
        IntentCategory::Process => PROCESS,
        IntentCategory::Explore => EXPLORE,
        IntentCategory::Learn => LEARN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_no_duplicate_texts_across_pools() {
        let mut seen = HashSet::new();
        let mut all: Vec<&Fragment> = UNIVERSAL.iter().collect();
        for m in crate::domain::audio::VoiceKind::ALL {
            all.extend(mode(m));
        }
        for t in [
            TimeOfDay::Dawn,
            TimeOfDay::Morning,
            TimeOfDay::Afternoon,
            TimeOfDay::Dusk,
            TimeOfDay::Night,
            TimeOfDay::Witching,
        ] {
            all.extend(time_of_day(t));
        }
        for c in IntentCategory::ALL {
            all.extend(intent(c));
        }
        for fragment in all {
            assert!(seen.insert(fragment.text), "duplicate: {}", fragment.text);
        }
    }
}
