use std::fmt::Write;

use crate::summaries::dto::Summary;

/// Builds the user message for a summary. Only numbers and food names go in;
/// nothing identifies the owner.
pub fn build_prompt(summary: &Summary) -> String {
    let agg = &summary.aggregate;
    let scope = match summary.period {
        "day" => format!("on {}", summary.label),
        _ => format!("for the {} {}", summary.period, summary.label),
    };

    if agg.count == 0 {
        return format!(
            "I did not log any meals {scope}. \
             Give me one short, friendly suggestion to start tracking what I eat."
        );
    }

    let t = &agg.totals;
    let mut prompt = format!(
        "I logged {count} meal{s} {scope}. Totals: {cal:.0} kcal, {p:.1} g protein, \
         {f:.1} g fat, {c:.1} g carbohydrates, {sug:.1} g sugars.",
        count = agg.count,
        s = if agg.count == 1 { "" } else { "s" },
        cal = t.calories,
        p = t.protein_g,
        f = t.fat_g,
        c = t.carbs_g,
        sug = t.sugars_g,
    );
    if agg.profiled_count < agg.count {
        let _ = write!(
            prompt,
            " {} of those meals have no nutrition data.",
            agg.count - agg.profiled_count
        );
    }
    if !agg.top_foods.is_empty() {
        let foods: Vec<&str> = agg.top_foods.iter().map(|f| f.food_name.as_str()).collect();
        let _ = write!(prompt, " Most calories came from: {}.", foods.join(", "));
    }
    prompt.push_str(" In one or two sentences, how am I doing and what should I adjust?");
    prompt
}
