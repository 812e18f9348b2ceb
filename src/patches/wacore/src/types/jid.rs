use crate::libsignal::protocol::ProtocolAddress;
use wacore_binary::jid::Jid;

pub trait JidExt {
    fn to_protocol_address(&self) -> ProtocolAddress;

    /// Returns the Signal address string in WhatsApp Web format.
    /// Format: `{user}[:device]@{server}`
    /// - Device part `:device` only included when `device != 0`
    /// - Examples: `123456789@lid`, `123456789:33@lid`, `5511999887766@c.us`
    fn to_signal_address_string(&self) -> String;
}

impl JidExt for Jid {
    fn to_signal_address_string(&self) -> String {
        // WhatsApp Web's SignalAddress.toString() format:
        // - Device part `:device` only included when device != 0
        // - Full format: {user}[:device]@{server}
        //
        // From WAWebSignalAddress module:
        // ```javascript
        // toString=function(){
        //   var t=this.wid.device!=null&&this.wid.device!==0?":"+this.wid.device:"";
        //   // ...
        //   return [i.user,t,"@lid"].join("")
        // }
        // ```
        let device_part = if self.device != 0 {
            format!(":{}", self.device)
        } else {
            String::new()
        };

        // Map server names to WhatsApp Web's internal format
        // WhatsApp Web uses @c.us for phone numbers, @lid for LID
        let server = match self.server.as_str() {
            "s.whatsapp.net" => "c.us",
            other => other,
        };

        format!("{}{device_part}@{server}", self.user)
    }

    fn to_protocol_address(&self) -> ProtocolAddress {
        // WhatsApp Web's createSignalLikeAddress format:
        // ```javascript
        // function g(e){
        //   var t=0,  // <-- always 0 for the device_id portion
        //   n=new(o("WAWebSignalAddress")).SignalAddress(e),
        //   r=n.toString();
        //   return r+"."+t  // Signal address + ".0"
        // }
        // ```
        //
        // The full session key format is: {SignalAddress.toString()}.0
        // Examples:
        // - 123456789@lid.0 (LID user, device 0)
        // - 123456789:33@lid.0 (LID user with device 33)
        // - 5511999887766@c.us.0 (Phone number, device 0)
        //
        // The device is encoded in the name, and device_id is always 0.
        let name = self.to_signal_address_string();
        ProtocolAddress::new(name, 0.into())
    }
}
