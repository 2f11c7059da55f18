use crate::core::BillResult;

const WIDTH: usize = 70;

/// Plain-text invoice. Amounts are rounded to cents here and nowhere else.
pub fn render_invoice(bill: &BillResult) -> String {
    let heavy = "=".repeat(WIDTH);
    let light = "-".repeat(WIDTH);
    let flag = capitalize(&bill.condition);
    let mut out = Vec::new();

    out.push(heavy.clone());
    out.push(format!("{:^WIDTH$}", "ELECTRICITY BILL"));
    out.push(heavy.clone());
    out.push(String::new());
    out.push(format!("Consumption: {:.2} kWh", bill.quantity));
    out.push(format!("Tariff flag: {flag}"));
    out.push(String::new());

    out.push(light.clone());
    out.push("CONSUMPTION BY TIER".to_string());
    out.push(light.clone());
    for line in &bill.tiers {
        out.push(format!(
            "  {:<20} | {:>10.2} kWh x {:.2} = {:>12.2}",
            line.label, line.quantity, line.unit_price, line.value
        ));
    }
    out.push(String::new());
    out.push(amount_row("Energy subtotal:", bill.subtotal));
    out.push(amount_row(&format!("{flag} flag surcharge:"), bill.surcharge));
    out.push("─".repeat(WIDTH));
    out.push(amount_row("Tax base:", bill.tax_base));
    out.push(String::new());

    out.push(light.clone());
    out.push("TAXES".to_string());
    out.push(light);
    for tax in &bill.taxes {
        out.push(amount_row(
            &format!("  {:<10} ({:>5.2}%):", tax.name, tax.rate * 100.0),
            tax.value,
        ));
    }
    out.push(String::new());
    out.push(amount_row("Total taxes:", bill.total_tax));
    out.push(String::new());

    out.push(heavy.clone());
    out.push(amount_row("TOTAL DUE:", bill.grand_total));
    out.push(heavy);

    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn amount_row(label: &str, amount: f64) -> String {
    format!("{label:<56}{amount:>14.2}")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
