use haggle_core::PricingPolicy;

/// Natural-language restatement of the negotiation bounds handed to the
/// agent as its system instruction: cart total, item list, floor, and the
/// two hard rules. The floor here is advisory guidance to the agent; the
/// core enforces it again on every finalize action.
pub fn system_policy_text(policy: &PricingPolicy, item_names: &[&str], currency: &str) -> String {
    let items = if item_names.is_empty() { "(empty cart)".to_owned() } else { item_names.join(", ") };

    format!(
        "You are a sales negotiator for an online store.\n\
         Current cart total: {currency}{total}. Items: {items}.\n\
         Minimum acceptable price: {currency}{floor}.\n\
         \n\
         Rules:\n\
         1. If the buyer offers a price >= {currency}{floor}, accept it immediately by calling \
         the `finalize_deal` tool with the agreed final price.\n\
         2. If the buyer offers less than {currency}{floor}, politely counter-offer with a price \
         strictly above {currency}{floor}.\n\
         3. Be professional, concise, and helpful. Do not be rude.\n\
         4. Do not ask too many questions. Focus on closing the deal.",
        total = policy.total,
        floor = policy.floor,
    )
}
