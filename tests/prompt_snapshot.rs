use word_immersion_rust::prompts::{render_example_prompt, render_selection_prompt};
use word_immersion_rust::settings::Difficulty;

#[test]
fn selection_prompt_snapshot() {
    let candidates = vec![
        "house".to_string(),
        "water".to_string(),
        "cold".to_string(),
    ];
    let prompt = render_selection_prompt(Difficulty::Beginner, 3, "Spanish", &candidates).unwrap();
    insta::assert_snapshot!(prompt, @r###"
    You pick vocabulary for a language learner from words found on a web page.
    Difficulty: beginner. Choose up to 3 words that will be shown in Spanish.
    Favor short, common, everyday words.
    Candidate words:
    house, water, cold

    Reply with a JSON array containing only the chosen words, and nothing else.
    "###);
}

#[test]
fn example_prompt_snapshot() {
    let prompt =
        render_example_prompt("house", "casa", "Spanish", "The house is big.").unwrap();
    insta::assert_snapshot!(prompt, @r###"
    A language learner clicked the word "casa" (Spanish for "house") on a web page.
    Write one short, simple example sentence in Spanish that uses "casa".
    Context from the page:
    The house is big.

    Reply with the sentence only.
    "###);
}
