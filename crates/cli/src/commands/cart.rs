use std::fmt::Write as _;

use haggle_core::config::AppConfig;
use haggle_core::FloorRule;

use crate::catalog;

pub fn run(config: &AppConfig) -> String {
    let cart = catalog::demo_cart();
    let currency = &config.negotiation.currency;
    let rule = FloorRule { floor_pct: config.negotiation.floor_pct };

    let mut output = String::from("Demo cart:\n");
    for item in cart.items() {
        let _ = writeln!(
            output,
            "  {} x{}  {currency}{}",
            item.name,
            item.quantity,
            item.line_total()
        );
    }
    let _ = writeln!(output, "Total:   {currency}{}", cart.total());
    let _ = writeln!(
        output,
        "Floor:   {currency}{} ({}% of total)",
        rule.compute_floor(cart.total()),
        config.negotiation.floor_pct
    );
    let _ = write!(output, "Payable: {currency}{}", cart.payable());
    output
}
