//! Static informational content: company profile and price list.

use crate::formatting::escape_html;

pub struct PriceSection {
    pub title: &'static str,
    pub details: &'static [&'static str],
}

pub const PRICE_LIST: &[PriceSection] = &[
    PriceSection {
        title: "💧 Cartridges and filter elements",
        details: &[],
    },
    PriceSection {
        title: "🌀 Non-woven polypropylene cartridge BB10 — 330 ₽",
        details: &["Deep removal of sand, rust and silt particles"],
    },
    PriceSection {
        title: "⚫ Pressed activated carbon cartridge BB20 — 1 100 ₽",
        details: &["Removes chlorine, organics, unpleasant odours and tastes"],
    },
    PriceSection {
        title: "🧂 Softener salt tablets (25 kg bag) — from 875 ₽",
        details: &["High purity, no additives, ideal for ion-exchange resin regeneration"],
    },
    PriceSection {
        title: "🛠️ Water treatment system servicing — from 4 000 ₽",
        details: &[],
    },
];

pub const COMPANY_INFO: &str = "💧 <b>Aquafresca</b> — water treatment experts in Saint Petersburg and the Leningrad region! 🌊

📍 We purify water from:
• 🕳️ Boreholes
• 🪣 Wells
• 🌊 Open sources
• 🏠 Municipal supply

🚫 We remove:
• 💎 Hardness
• ⚫ Iron (ferrous and ferric)
• 🟣 Dissolved manganese
• 🦠 Bacteria and microorganisms
• ⚠️ Anything else above sanitary limits

🏭 <b>Industrial water treatment</b>
Custom systems for food production 🥫, boiler houses 🔥 and manufacturing ⚙️.

✅ <b>Why Aquafresca?</b>
• 🏆 10+ years of experience
• 🔬 Certified equipment from proven brands
• 👷‍♂️ Our own service team
• 💰 Honest prices, no hidden fees
• 📜 Up to 3 years warranty on equipment and installation

📞 Contact us today — our engineers will advise you for free!";

pub const GREETING: &str = "👋 Welcome to <b>Aquafresca</b>!\n\n\
Water treatment experts in Saint Petersburg and the Leningrad region 🌊\n\
Choose an action below 👇";

/// Price list rendered for Telegram HTML.
pub fn price_list_html() -> String {
    let mut out = String::from("📊 <b>Price list for water treatment consumables</b>\n\n");
    for section in PRICE_LIST {
        out.push_str(&format!("<b>{}</b>\n", escape_html(section.title)));
        for line in section.details {
            out.push_str(&escape_html(line));
            out.push('\n');
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_list_contains_every_section_in_bold() {
        let html = price_list_html();
        for section in PRICE_LIST {
            assert!(html.contains(&format!("<b>{}</b>", section.title)));
        }
        assert!(html.contains("ion-exchange"));
    }
}
