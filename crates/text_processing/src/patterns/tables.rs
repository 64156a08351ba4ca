//! Built-in Russian rule tables
//!
//! Priorities: goodbye/operator/complaint sit above everything so a caller can
//! always leave or reach a human; multi-word topic phrases beat single
//! keywords; bare affirm/deny are weakest.

use voice_support_core::{EntityKind, IntentTag};

use super::{RuleSpec, ValueSource};

pub(super) fn builtin_rules() -> Vec<RuleSpec> {
    let mut rules = intent_rules();
    rules.extend(entity_rules());
    rules.extend(city_rules());
    rules.extend(product_rules());
    rules.extend(name_rules());
    rules
}

fn intent_rules() -> Vec<RuleSpec> {
    use IntentTag::*;

    vec![
        // Leaving and reaching a human
        RuleSpec::intent("goodbye_formal", r"\bдо свидания\b", Goodbye, 90),
        RuleSpec::intent("goodbye_wishes", r"\b(?:всего доброго|всего хорошего|до встречи)\b", Goodbye, 90),
        RuleSpec::intent("goodbye_thanks", r"\bспасибо за помощь\b", Goodbye, 85),
        // "пока" is also "yet"; only a leading or closing one says goodbye
        RuleSpec::intent("goodbye_short", r"^(?:пока|прощай)\b|\b(?:пока|прощай)\.?$", Goodbye, 60),
        RuleSpec::intent("operator_person", r"\b(?:оператор\w*|живой человек|живым человеком|менеджер\w*|специалист\w*)", Operator, 80),
        RuleSpec::intent("operator_connect", r"\bсоедин\w* с\b", Operator, 70),
        RuleSpec::intent("complaint_word", r"\b(?:жалоб\w*|пожаловаться|безобрази\w*|ужасн\w*)", Complaint, 75),
        RuleSpec::intent("complaint_broken", r"\bне работает\b", Complaint, 70),
        // Order
        RuleSpec::intent("order_cancel_phrase", r"\bотмен\w* (?:мой |мою )?заказ\w*", OrderCancel, 80),
        RuleSpec::intent("order_where", r"\bгде (?:мой |моя |же )?(?:заказ|посылк)\w*", OrderStatus, 70),
        RuleSpec::intent("order_status_phrase", r"\bстатус\w* (?:моего )?заказа\b", OrderStatus, 70),
        RuleSpec::intent("order_check", r"\b(?:проверить|узнать|отследить) (?:мой |статус )?заказ\w*", OrderStatus, 60),
        RuleSpec::intent("order_cancel_word", r"\bотменить\b", OrderCancel, 50),
        RuleSpec::intent("order_word", r"\bзаказ\w*", OrderStatus, 25),
        // Shipping
        RuleSpec::intent("shipping_change_address", r"\b(?:изменить|поменять|сменить|другой|новый) адрес\w*", ShippingChange, 80),
        RuleSpec::intent("delivery_cost_phrase", r"\b(?:сколько стоит|стоимость|цена|цену|рассчитать) доставк\w*", DeliveryCost, 75),
        RuleSpec::intent("delivery_time_when", r"\bкогда (?:его |ее |их )?(?:привезут|доставят|придет|приедет|получу)\b", DeliveryTime, 75),
        RuleSpec::intent("delivery_time_term", r"\bсрок\w* доставк\w*", DeliveryTime, 75),
        RuleSpec::intent("delivery_methods_phrase", r"\b(?:способ\w*|вариант\w*) доставк\w*", DeliveryMethods, 75),
        RuleSpec::intent("delivery_methods_how", r"\bкак (?:можно )?(?:получить|доставить)\b", DeliveryMethods, 55),
        RuleSpec::intent("delivery_cost_short", r"\bсколько (?:будет )?стоит\b", DeliveryCost, 45),
        RuleSpec::intent("shipping_word", r"\bдоставк\w*", ShippingInquiry, 30),
        RuleSpec::intent("shipping_related", r"\b(?:доставить|посылк\w*|адрес\w*)", ShippingInquiry, 25),
        // Payment
        RuleSpec::intent("payment_problem_phrase", r"\b(?:проблем\w* с оплат\w*|оплата не прош\w*|не (?:могу|получается) оплатить|списал\w* дважды)", PaymentProblem, 80),
        RuleSpec::intent("refund_phrase", r"\b(?:возврат\w*|вернуть деньги|верните деньги)", Refund, 75),
        RuleSpec::intent("payment_methods_phrase", r"\b(?:способ\w*|как) (?:можно )?оплат\w*", PaymentMethods, 75),
        RuleSpec::intent("payment_methods_with", r"\bчем (?:можно )?(?:оплатить|платить)\b", PaymentMethods, 70),
        RuleSpec::intent("payment_word", r"\b(?:оплат\w*|заплатить|платеж\w*|счет)", PaymentInquiry, 30),
        // Conversation control
        RuleSpec::intent("repeat_phrase", r"\b(?:повтори\w*|еще раз|не расслышал\w*)", Repeat, 50),
        RuleSpec::intent("help_phrase", r"\b(?:помощь|помогите|что вы умеете|что ты умеешь)\b", Help, 40),
        RuleSpec::intent("affirm_leading", r"^(?:да|ага|конечно|хорошо|давайте|верно|угу|соединяйте)\b", Affirm, 30),
        RuleSpec::intent("deny_leading", r"^(?:нет|не надо|не нужно|неа)\b", Deny, 30),
        RuleSpec::intent("greeting_word", r"\b(?:здравствуйте|привет|добрый день|добрый вечер|доброе утро)\b", Greeting, 20),
        RuleSpec::intent("affirm_word", r"\bда\b", Affirm, 15),
        RuleSpec::intent("deny_word", r"\bнет\b", Deny, 15),
    ]
}

fn entity_rules() -> Vec<RuleSpec> {
    use EntityKind::*;
    use ValueSource::*;

    let fixed = |v: &str| Fixed(v.to_string());

    vec![
        RuleSpec::entity("order_number_keyword", r"\bзаказ\w*\s+(?:номер\s+)?(?:№\s*)?(\d{3,12})\b", OrderNumber, Capture, 80),
        RuleSpec::entity("order_number_sign", r"[№#]\s*(\d{3,12})\b", OrderNumber, Capture, 80),
        RuleSpec::entity("order_number_numbered", r"\bномер\w*\s+(?:заказа\s+)?(\d{3,12})\b", OrderNumber, Capture, 70),
        RuleSpec::entity("postcode", r"\b([1-6]\d{5})\b", Postcode, Capture, 50),
        RuleSpec::entity("street", r"\b(?:ул\.\s*|ул\s+|улиц[аеуы]\s+|проспект\w*\s+)([а-я][а-я-]+)", Street, Capitalized, 60),
        RuleSpec::entity("house", r"\b(?:д\.\s*|д\s+|дом\w*\s+)(\d+[а-я]?(?:/\d+)?)", House, Capture, 60),
        RuleSpec::entity("apartment", r"\b(?:кв\.\s*|кв\s+|квартир\w*\s+)(\d+)", Apartment, Capture, 60),
        RuleSpec::entity("delivery_courier", r"\bкурьер\w*", DeliveryMethod, fixed("courier"), 60),
        RuleSpec::entity("delivery_pickup", r"\b(?:самовывоз\w*|пункт\w* выдачи|пвз)", DeliveryMethod, fixed("pickup"), 60),
        RuleSpec::entity("delivery_post", r"\bпочт(?:а|ой|у|ы)\b", DeliveryMethod, fixed("post"), 60),
        RuleSpec::entity("delivery_express", r"\b(?:экспресс\w*|срочн\w*|побыстрее)", DeliveryMethod, fixed("express"), 60),
        RuleSpec::entity("payment_card", r"\bкарт(?:а|ой|у|е|ы|очк\w*)\b", PaymentMethod, fixed("card"), 60),
        RuleSpec::entity("payment_cash", r"\bналичн\w*", PaymentMethod, fixed("cash"), 60),
        RuleSpec::entity("payment_online", r"\bонлайн\b", PaymentMethod, fixed("online"), 60),
        RuleSpec::entity("payment_yoomoney", r"\b(?:юмани|юmoney|yoomoney|яндекс деньг\w*)", PaymentMethod, fixed("yoomoney"), 60),
        RuleSpec::entity("payment_qr", r"\b(?:qr|кьюар)", PaymentMethod, fixed("qr"), 60),
        RuleSpec::entity("digit_sequence", r"\d+", DigitSequence, Capture, 10),
    ]
}

/// Cities: dictionary stems map to the nominative form; the `г.`/`город`
/// rule catches anything else with a lower priority.
fn city_rules() -> Vec<RuleSpec> {
    const CITIES: &[(&str, &str)] = &[
        (r"\bмоскв\w*", "Москва"),
        (r"\b(?:санкт-петербург\w*|петербург\w*|питер\w*|спб)\b", "Санкт-Петербург"),
        (r"\bновосибирск\w*", "Новосибирск"),
        (r"\bекатеринбург\w*", "Екатеринбург"),
        (r"\bказан[ьи]\b", "Казань"),
        (r"\bнижн\w* новгород\w*", "Нижний Новгород"),
        (r"\bчелябинск\w*", "Челябинск"),
        (r"\bсамар\w*", "Самара"),
        (r"\bомск\w*", "Омск"),
        (r"\bростов\w*", "Ростов-на-Дону"),
        (r"\bуф[аеуы]\b", "Уфа"),
        (r"\bкрасноярск\w*", "Красноярск"),
        (r"\bперм[ьи]\b", "Пермь"),
        (r"\bворонеж\w*", "Воронеж"),
        (r"\bволгоград\w*", "Волгоград"),
        (r"\bкраснодар\w*", "Краснодар"),
        (r"\bтюмен[ьи]\b", "Тюмень"),
        (r"\bтомск\w*", "Томск"),
    ];

    let mut rules: Vec<RuleSpec> = CITIES
        .iter()
        .map(|(pattern, name)| {
            RuleSpec::entity(
                &format!("city_{}", name),
                pattern,
                EntityKind::City,
                ValueSource::Fixed(name.to_string()),
                70,
            )
        })
        .collect();

    rules.push(RuleSpec::entity(
        "city_marker",
        r"\b(?:г\.\s*|г\s+|город\w*\s+)([а-я][а-я-]+)",
        EntityKind::City,
        ValueSource::Capitalized,
        60,
    ));
    rules
}

fn product_rules() -> Vec<RuleSpec> {
    // (category, stem pattern, canonical item)
    const PRODUCTS: &[(&str, &str, &str)] = &[
        ("electronics", r"\b(?:телефон|смартфон)\w*", "телефон"),
        ("electronics", r"\bноутбук\w*", "ноутбук"),
        ("electronics", r"\bпланшет\w*", "планшет"),
        ("electronics", r"\bнаушник\w*", "наушники"),
        ("electronics", r"\bтелевизор\w*", "телевизор"),
        ("clothing", r"\bфутболк\w*", "футболка"),
        ("clothing", r"\bкуртк\w*", "куртка"),
        ("clothing", r"\bплать\w*", "платье"),
        ("clothing", r"\bджинс\w*", "джинсы"),
        ("clothing", r"\bкроссовк\w*", "кроссовки"),
        ("books", r"\bкниг\w*", "книга"),
        ("books", r"\bучебник\w*", "учебник"),
        ("home", r"\bпосуд\w*", "посуда"),
        ("home", r"\bкастрюл\w*", "кастрюля"),
        ("home", r"\bпостельн\w* бель\w*", "постельное бельё"),
        ("beauty", r"\bкрем\w*", "крем"),
        ("beauty", r"\bшампун\w*", "шампунь"),
        ("beauty", r"\bпомад\w*", "помада"),
    ];

    PRODUCTS
        .iter()
        .map(|(category, pattern, item)| {
            RuleSpec::entity(
                &format!("product_{}_{}", category, item),
                pattern,
                EntityKind::Product,
                ValueSource::Fixed(item.to_string()),
                50,
            )
        })
        .collect()
}

fn name_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::entity(
            "name_introduced",
            r"\b(?:меня зовут|это говорит|мое имя)\s+([а-я]+)",
            EntityKind::PersonName,
            ValueSource::Capitalized,
            80,
        ),
        RuleSpec::entity(
            "name_dictionary",
            r"\b(анна|мария|елена|ольга|наталья|татьяна|ирина|светлана|екатерина|юлия|александр|алексей|андрей|дмитрий|сергей|иван|михаил|николай|владимир|павел)\b",
            EntityKind::PersonName,
            ValueSource::Capitalized,
            40,
        ),
    ]
}
